//! Turn Telegram updates into attachment candidates.
//!
//! `file_unique_id` is stable across bots and re-sends, so it becomes the
//! attachment id; `file_id` is what `getFile` accepts, so it is the external id.

use teloxide::types::{FileMeta, Message};

use attache_core::{attachment::PartialAttachment, sniff::extension_for_mime};

/// Every file referenced by `msg`, largest photo size only.
pub fn attachments_from_message(msg: &Message) -> Vec<PartialAttachment> {
    let chat_id = msg.chat.id.0.to_string();
    let message_id = msg.id.0.to_string();
    let owner = (chat_id.as_str(), message_id.as_str());

    let mut out = Vec::new();

    if let Some(best) = msg.photo().and_then(|sizes| sizes.last()) {
        // Telegram re-encodes photos as JPEG.
        out.push(candidate(
            owner,
            &best.file,
            Some("image/jpeg".to_string()),
            None,
        ));
    }
    if let Some(doc) = msg.document() {
        out.push(candidate(
            owner,
            &doc.file,
            doc.mime_type.as_ref().map(|m| m.to_string()),
            doc.file_name.as_deref(),
        ));
    }
    if let Some(voice) = msg.voice() {
        out.push(candidate(
            owner,
            &voice.file,
            voice.mime_type.as_ref().map(|m| m.to_string()),
            None,
        ));
    }
    if let Some(audio) = msg.audio() {
        out.push(candidate(
            owner,
            &audio.file,
            audio.mime_type.as_ref().map(|m| m.to_string()),
            audio.file_name.as_deref(),
        ));
    }
    if let Some(video) = msg.video() {
        out.push(candidate(
            owner,
            &video.file,
            video.mime_type.as_ref().map(|m| m.to_string()),
            video.file_name.as_deref(),
        ));
    }
    if let Some(anim) = msg.animation() {
        out.push(candidate(
            owner,
            &anim.file,
            anim.mime_type.as_ref().map(|m| m.to_string()),
            anim.file_name.as_deref(),
        ));
    }
    if let Some(sticker) = msg.sticker() {
        // Format is sniffed on first resolve.
        out.push(candidate(owner, &sticker.file, None, None));
    }

    out
}

fn candidate(
    (chat_id, message_id): (&str, &str),
    file: &FileMeta,
    mime: Option<String>,
    file_name: Option<&str>,
) -> PartialAttachment {
    let extension = file_name
        .and_then(extension_from_name)
        .or_else(|| mime.as_deref().and_then(extension_for_mime).map(str::to_string));
    PartialAttachment {
        id: Some(file.unique_id.clone()),
        external_id: Some(file.id.clone()),
        chat_id: Some(chat_id.to_string()),
        message_id: Some(message_id.to_string()),
        size: (file.size > 0).then(|| u64::from(file.size)),
        last_url: None,
        last_url_until: None,
        extension,
        mime_type: mime,
    }
}

fn extension_from_name(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 8 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
