use std::path::Path;

use pixlink_core::viewmodel::GenerateViewModel;

use crate::commands::common::{resolve_text, truncate, AppContext};
use crate::error::CliError;

pub async fn run_generate(
    context: &AppContext,
    prompt: &[String],
    publish: bool,
    save: Option<&Path>,
) -> Result<(), CliError> {
    let prompt = resolve_text(prompt)?;
    let mut generator = GenerateViewModel::new(context.backend.clone());
    generator.set_prompt(prompt);

    let reference = generator.generate().await?;
    println!("Generated {}", describe_reference(reference));

    if let Some(dir) = save {
        let path = generator.save_to(dir).await?;
        println!("Saved {}", path.display());
    }
    if publish {
        let image = generator.publish().await?;
        println!("Published '{}' ({})", image.title, image.id);
    }
    Ok(())
}

/// Short label for a generated image, which may be an inline data URL.
pub fn describe_reference(reference: &str) -> String {
    if reference.starts_with("data:") {
        let mime = reference
            .trim_start_matches("data:")
            .split([';', ','])
            .next()
            .filter(|mime| !mime.is_empty())
            .unwrap_or("image");
        format!("inline {mime} ({} bytes encoded)", reference.len())
    } else {
        truncate(reference, 120)
    }
}
