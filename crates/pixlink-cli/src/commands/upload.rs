use std::path::Path;

use pixlink_core::media::FileUpload;
use pixlink_core::models::Image;
use pixlink_core::viewmodel::UploadViewModel;

use crate::commands::common::{render_tags, AppContext};
use crate::error::CliError;

pub async fn run_upload(
    context: &AppContext,
    file: &Path,
    tags: &[String],
) -> Result<(), CliError> {
    let (image, tags) = upload_file(context, file, tags).await?;
    println!("Uploaded '{}' ({})", image.title, image.id);
    println!("tags: {}", render_tags(&tags));
    Ok(())
}

/// Upload `file` with `tags`, returning the new image and the tags kept.
pub async fn upload_file(
    context: &AppContext,
    file: &Path,
    tags: &[String],
) -> Result<(Image, Vec<String>), CliError> {
    let mut form = UploadViewModel::new(context.backend.clone());
    form.select_file(FileUpload::from_path(file).await?);
    for tag in tags {
        form.add_tag(tag);
    }
    let kept = form.tags().to_vec();
    let image = form.submit().await?;
    Ok((image, kept))
}
