use std::path::PathBuf;

use pixlink_core::models::CommentId;
use pixlink_core::viewmodel::ImageCard;

use crate::cli::ImageCommands;
use crate::commands::common::{
    find_image, format_comment_lines, format_timestamp, parse_id, render_tags, resolve_text,
    AppContext,
};
use crate::error::CliError;

pub async fn run_image(command: ImageCommands, context: &AppContext) -> Result<(), CliError> {
    match command {
        ImageCommands::Show {
            id,
            comments,
            watch,
        } => {
            let mut card = open_card(context, &id).await?;
            if comments {
                card.toggle_comments().await?;
            }
            print_card(&card);
            while watch {
                let Some(table) = card.next_change().await? else {
                    break;
                };
                tracing::debug!("Card changed via {}", table.as_str());
                println!();
                print_card(&card);
            }
            Ok(())
        }
        ImageCommands::Like { id } => {
            let mut card = open_card(context, &id).await?;
            card.toggle_like().await?;
            card.refresh_likes().await?;
            let verb = if card.liked() { "Liked" } else { "Unliked" };
            println!("{verb} '{}' ({} likes)", card.image().title, card.like_count());
            Ok(())
        }
        ImageCommands::Comment { id, text } => {
            let text = resolve_text(&text)?;
            let mut card = open_card(context, &id).await?;
            card.set_draft(text);
            card.post_comment().await?;
            println!("Commented on '{}'", card.image().title);
            Ok(())
        }
        ImageCommands::Uncomment { id, comment_id } => {
            let comment_id: CommentId = parse_id(&comment_id)?;
            let mut card = open_card(context, &id).await?;
            card.toggle_comments().await?;
            card.delete_comment(comment_id).await?;
            println!("Deleted comment {comment_id}");
            Ok(())
        }
        ImageCommands::Delete { id } => {
            context.backend.session.require_user()?;
            let card = open_card(context, &id).await?;
            if !card.is_owner() {
                return Err(CliError::NotOwner(card.image().title.clone()));
            }
            card.delete_image().await?;
            println!("Deleted image '{}'", card.image().title);
            Ok(())
        }
        ImageCommands::Download { id, output } => {
            let card = open_card(context, &id).await?;
            let dir = match output {
                Some(dir) => dir,
                None => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            };
            let path = card.download(&dir).await?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

async fn open_card(context: &AppContext, raw_id: &str) -> Result<ImageCard, CliError> {
    let image = find_image(&context.backend, raw_id).await?;
    Ok(ImageCard::open(context.backend.clone(), image).await?)
}

pub fn format_card_lines(card: &ImageCard) -> Vec<String> {
    let image = card.image();
    let mut lines = vec![
        image.title.clone(),
        format!("id:       {}", image.id),
        format!("url:      {}", image.image_url),
        format!("posted:   {}", format_timestamp(image.created_at)),
    ];
    if let Some(description) = image.description.as_deref() {
        lines.push(format!("about:    {description}"));
    }
    let liked = if card.liked() { " (you like this)" } else { "" };
    lines.push(format!("likes:    {}{liked}", card.like_count()));
    if !card.tags().is_empty() {
        lines.push(format!("tags:     {}", render_tags(card.tags())));
    }
    if card.comments_open() {
        lines.push(format!("comments: {}", card.comments().len()));
        lines.extend(
            format_comment_lines(card.comments())
                .into_iter()
                .map(|line| format!("  {line}")),
        );
    }
    lines
}

fn print_card(card: &ImageCard) {
    for line in format_card_lines(card) {
        println!("{line}");
    }
}
