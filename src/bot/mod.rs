/// Update endpoints: Telegram updates in, core events out
pub mod handlers;
/// Render delivery with resilient sends and edits
pub mod messaging;
