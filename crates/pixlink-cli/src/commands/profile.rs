use pixlink_core::media::FileUpload;
use pixlink_core::models::Profile;
use pixlink_core::viewmodel::ProfileViewModel;

use crate::cli::ProfileCommands;
use crate::commands::common::AppContext;
use crate::error::CliError;

pub async fn run_profile(command: ProfileCommands, context: &AppContext) -> Result<(), CliError> {
    let mut page = ProfileViewModel::new(context.backend.clone());
    page.load_or_create().await?;

    match command {
        ProfileCommands::Show => {
            if let Some(profile) = page.profile() {
                print_profile(profile);
            }
        }
        ProfileCommands::Edit {
            username,
            full_name,
        } => {
            let profile = page.save(&username, &full_name).await?;
            println!("Saved profile");
            print_profile(profile);
        }
        ProfileCommands::Avatar { file } => {
            let upload = FileUpload::from_path(&file).await?;
            let url = page.upload_avatar(&upload).await?;
            println!("Avatar updated: {url}");
        }
    }
    Ok(())
}

pub fn format_profile_lines(profile: &Profile) -> Vec<String> {
    let mut lines = vec![
        format!("username:  {}", profile.username),
        format!("id:        {}", profile.id),
    ];
    if let Some(full_name) = profile.full_name.as_deref() {
        lines.push(format!("full name: {full_name}"));
    }
    if let Some(avatar_url) = profile.avatar_url.as_deref() {
        lines.push(format!("avatar:    {avatar_url}"));
    }
    lines
}

fn print_profile(profile: &Profile) {
    for line in format_profile_lines(profile) {
        println!("{line}");
    }
}
