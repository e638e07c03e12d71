use pixlink_core::auth::{OAuthProvider, SignUpOutcome, SignUpRequest};

use crate::cli::AuthCommands;
use crate::commands::common::{auth_error, AppContext, GlobalOptions};
use crate::error::CliError;

pub async fn run_auth(command: AuthCommands, options: &GlobalOptions) -> Result<(), CliError> {
    let context = AppContext::open(options).await?;
    let profile_name = &context.profile_name;
    let auth = &context.auth;

    match command {
        AuthCommands::SignUp {
            email,
            password,
            username,
            full_name,
        } => {
            let request = SignUpRequest {
                email,
                password,
                username,
                full_name,
            };
            match auth.sign_up(&request).await.map_err(auth_error)? {
                SignUpOutcome::SignedIn(session) => {
                    let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                    println!("Signed up profile '{profile_name}' as {email_label}");
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!(
                        "Check your inbox to confirm the account, then run `pixlink auth login`."
                    );
                }
            }
            Ok(())
        }
        AuthCommands::Login { email, password } => {
            let user = auth.sign_in(&email, &password).await.map_err(auth_error)?;
            let email_label = user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
            Ok(())
        }
        AuthCommands::Oauth {
            provider,
            redirect_to,
        } => {
            let provider = provider.parse::<OAuthProvider>().map_err(auth_error)?;
            let url = auth
                .oauth_url(provider, redirect_to.as_deref())
                .map_err(auth_error)?;
            println!("Open this URL to continue with {}:", provider.as_str());
            println!("{url}");
            println!("Then run `pixlink auth complete <redirect-url>`.");
            Ok(())
        }
        AuthCommands::Complete { redirect_url } => {
            let user = auth
                .complete_oauth(&redirect_url)
                .await
                .map_err(auth_error)?;
            let email_label = user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
            Ok(())
        }
        AuthCommands::Status => {
            if let Some(session) = auth.session().current_session() {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (expires_at={})",
                    profile_name, email_label, session.expires_at
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
            Ok(())
        }
        AuthCommands::Refresh => {
            let user = auth.refresh().await.map_err(auth_error)?;
            let email_label = user.email.as_deref().unwrap_or("(no email)");
            println!("Refreshed session for {email_label}");
            Ok(())
        }
        AuthCommands::Logout => {
            auth.sign_out().await.map_err(auth_error)?;
            println!("Signed out profile '{profile_name}'");
            Ok(())
        }
    }
}
