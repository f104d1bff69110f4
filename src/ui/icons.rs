//! Shared UI icons.
//!
//! Each icon has a plain-text fallback for terminals without emoji support.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "[!]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("✨ ", "*");

// Session
pub static KEY: Emoji<'_, '_> = Emoji("🔑 ", "");
pub static USER: Emoji<'_, '_> = Emoji("👤 ", "");
pub static SITE: Emoji<'_, '_> = Emoji("🌐 ", "");

// Tasks and actions
pub static TASK: Emoji<'_, '_> = Emoji("📋 ", "-");
pub static PREVIEW: Emoji<'_, '_> = Emoji("👁️  ", "[P]");
pub static SEND: Emoji<'_, '_> = Emoji("📤 ", "[>]");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "[D]");
pub static LINK: Emoji<'_, '_> = Emoji("🔗 ", "");
