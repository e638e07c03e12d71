use pixlink_core::viewmodel::GalleryViewModel;

use crate::commands::common::{format_gallery_lines, gallery_to_list_item, AppContext};
use crate::error::CliError;

pub async fn run_gallery(
    context: &AppContext,
    search: Option<&str>,
    json: bool,
    watch: bool,
) -> Result<(), CliError> {
    let mut gallery = GalleryViewModel::new(context.backend.clone());
    if let Some(search) = search {
        gallery.set_query(search);
    }

    if watch {
        gallery.mount().await?;
    } else {
        gallery.refresh().await;
    }
    if let Some(error) = gallery.last_error() {
        return Err(CliError::Gallery(error.to_string()));
    }
    print_gallery(&gallery, json)?;

    while watch && gallery.next_change().await {
        if let Some(error) = gallery.last_error() {
            eprintln!("Gallery refresh failed: {error}");
            continue;
        }
        println!();
        print_gallery(&gallery, json)?;
    }
    Ok(())
}

pub fn render_gallery(gallery: &GalleryViewModel, json: bool) -> Result<Vec<String>, CliError> {
    let visible = gallery.visible();
    if json {
        let items = visible
            .into_iter()
            .map(gallery_to_list_item)
            .collect::<Vec<_>>();
        return Ok(vec![serde_json::to_string_pretty(&items)?]);
    }
    if visible.is_empty() {
        return Ok(vec!["No images found.".to_string()]);
    }
    Ok(format_gallery_lines(&visible))
}

fn print_gallery(gallery: &GalleryViewModel, json: bool) -> Result<(), CliError> {
    for line in render_gallery(gallery, json)? {
        println!("{line}");
    }
    Ok(())
}
