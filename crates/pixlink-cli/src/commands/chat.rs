use pixlink_core::models::{ChatId, ConversationPreview, UserId};
use pixlink_core::viewmodel::ChatViewModel;

use crate::cli::ChatCommands;
use crate::commands::common::{
    format_thread_lines, parse_id, resolve_text, short_id, truncate, AppContext,
    ConversationListItem,
};
use crate::error::CliError;

pub async fn run_chat(command: ChatCommands, context: &AppContext) -> Result<(), CliError> {
    let mut chats = ChatViewModel::new(context.backend.clone());
    match command {
        ChatCommands::List { search, json } => {
            chats.load_conversations().await?;
            if let Some(search) = search {
                chats.set_search(search);
            }
            for line in render_conversations(&chats.visible_conversations(), json)? {
                println!("{line}");
            }
            Ok(())
        }
        ChatCommands::Start { user_id } => {
            let other: UserId = parse_id(&user_id)?;
            let chat = chats.start_or_open_chat(other).await?;
            println!("{chat}");
            Ok(())
        }
        ChatCommands::Open { chat_id, watch } => {
            let chat: ChatId = parse_id(&chat_id)?;
            chats.open_thread(chat).await?;
            let mut printed = print_new_messages(&chats, 0);
            while watch && chats.next_change().await? {
                printed = print_new_messages(&chats, printed);
            }
            Ok(())
        }
        ChatCommands::Send { chat_id, text } => {
            let chat: ChatId = parse_id(&chat_id)?;
            let text = resolve_text(&text)?;
            chats.open_thread(chat).await?;
            chats.set_compose(text);
            chats.send_message().await?;
            println!("Sent");
            Ok(())
        }
    }
}

fn print_new_messages(chats: &ChatViewModel, already_printed: usize) -> usize {
    let messages = chats.messages();
    for line in format_thread_lines(messages.get(already_printed..).unwrap_or_default()) {
        println!("{line}");
    }
    messages.len()
}

pub fn render_conversations(
    conversations: &[&ConversationPreview],
    json: bool,
) -> Result<Vec<String>, CliError> {
    if json {
        let items = conversations
            .iter()
            .map(|conversation| ConversationListItem {
                chat_id: conversation.chat_id.to_string(),
                partner_id: conversation.partner.id.to_string(),
                partner: conversation.partner.username.clone(),
                full_name: conversation.partner.full_name.clone(),
                last_message: conversation
                    .last_message
                    .as_ref()
                    .map(|last| last.content.clone()),
            })
            .collect::<Vec<_>>();
        return Ok(vec![serde_json::to_string_pretty(&items)?]);
    }
    if conversations.is_empty() {
        return Ok(vec!["No conversations yet.".to_string()]);
    }
    Ok(conversations
        .iter()
        .map(|conversation| {
            let last = conversation
                .last_message
                .as_ref()
                .map_or_else(|| "(no messages)".to_string(), |last| truncate(&last.content, 40));
            format!(
                "{:<13}  {:<20}  {last}",
                short_id(&conversation.chat_id.to_string()),
                conversation.partner.username
            )
        })
        .collect())
}
