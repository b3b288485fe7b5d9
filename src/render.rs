//! HTML fragments for the chat widget.
//!
//! Bot text is markdown; user text is shown literally. Raw HTML coming from
//! either side is escaped, never rendered.

use crate::types::{GalleryEntry, InlineImage, Message, Sender, unix_ms};
use comrak::plugins::syntect::SyntectAdapter;
use comrak::{ComrakOptions, ComrakPlugins, markdown_to_html_with_plugins};
use once_cell::sync::Lazy;
use time::format_description::FormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

static MARKDOWN_OPTIONS: Lazy<ComrakOptions> = Lazy::new(|| {
    let mut options = ComrakOptions::default();
    options.extension.table = true;
    options.extension.strikethrough = true;
    options.extension.autolink = true;
    options.extension.tasklist = true;
    options.render.escape = true;
    options
});

const MESSAGE_TIME_FORMAT: &[FormatItem<'static>] =
    format_description!("[hour repr:12 padding:none]:[minute padding:zero] [period case:upper]");

/// One tone of the reply cue.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Tone {
    pub frequency_hz: f32,
    pub offset_secs: f32,
    pub duration_secs: f32,
    pub peak_gain: f32,
}

/// Low then slightly higher, like a phone notification.
pub const REPLY_CUE: [Tone; 2] = [
    Tone {
        frequency_hz: 1200.0,
        offset_secs: 0.0,
        duration_secs: 0.12,
        peak_gain: 0.12,
    },
    Tone {
        frequency_hz: 1600.0,
        offset_secs: 0.18,
        duration_secs: 0.14,
        peak_gain: 0.12,
    },
];

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

pub fn markdown_to_html(md: &str) -> String {
    let adapter = SyntectAdapter::new(Some("base16-ocean.dark"));
    let mut plugins = ComrakPlugins::default();
    plugins.render.codefence_syntax_highlighter = Some(&adapter);
    markdown_to_html_with_plugins(md, &MARKDOWN_OPTIONS, &plugins)
}

/// User input, verbatim.
pub fn user_text_html(text: &str) -> String {
    format!(
        r#"<p class="message-text" style="white-space: pre-wrap">{}</p>"#,
        escape_html(text)
    )
}

pub fn format_time(at: OffsetDateTime) -> String {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    format_time_in(at, offset)
}

pub fn format_time_in(at: OffsetDateTime, offset: UtcOffset) -> String {
    at.to_offset(offset)
        .format(MESSAGE_TIME_FORMAT)
        .unwrap_or_default()
}

/// Inline image with enlarge / download / copy controls.
pub fn image_html(image: &InlineImage, prompt: &str, timestamp: i64) -> String {
    let src = escape_html(image.as_str());
    let alt = escape_html(prompt);
    format!(
        r#"<figure class="chat-image" data-timestamp="{timestamp}">
<img src="{src}" alt="{alt}" loading="lazy" data-action="enlarge"/>
<div class="image-overlay">
<button type="button" class="image-action" data-action="enlarge" title="Perbesar">⤢</button>
<a class="image-action" data-action="download" href="{src}" download="folio-{timestamp}.{ext}" title="Download">⬇</a>
<button type="button" class="image-action" data-action="copy" title="Salin gambar">⧉</button>
</div>
<figcaption>{alt}</figcaption>
</figure>"#,
        ext = image.extension(),
    )
}

/// Full-screen view of one image.
pub fn lightbox_html(image: &InlineImage, prompt: &str) -> String {
    format!(
        r#"<div class="lightbox" data-action="close"><img src="{}" alt="{}"/><p class="lightbox-caption">{}</p></div>"#,
        escape_html(image.as_str()),
        escape_html(prompt),
        escape_html(prompt),
    )
}

pub fn message_html(message: &Message) -> String {
    let sender = match message.sender {
        Sender::User => "user",
        Sender::Bot => "bot",
    };
    let failure = if message.failure.is_some() { " failed" } else { "" };
    let body = match message.sender {
        Sender::User => user_text_html(&message.text),
        Sender::Bot => format!(r#"<div class="md">{}</div>"#, markdown_to_html(&message.text)),
    };
    let image = match (&message.image, &message.image_prompt) {
        (Some(image), prompt) => image_html(
            image,
            prompt.as_deref().unwrap_or_default(),
            unix_ms(message.timestamp),
        ),
        (None, _) => String::new(),
    };
    format!(
        r#"<div class="message-row {sender}" data-id="{id}"><div class="bubble {sender}{failure}">{body}{image}</div><span class="message-timestamp">{time}</span></div>"#,
        id = message.id,
        time = format_time(message.timestamp),
    )
}

/// Newest first. Built from the gallery alone, not from the conversation.
pub fn gallery_html(entries: &[GalleryEntry]) -> String {
    if entries.is_empty() {
        return r#"<div class="gallery empty"><p>Belum ada gambar. Coba minta "buatkan gambar ..." 🎨</p></div>"#
            .to_string();
    }
    let mut html = String::from(r#"<div class="gallery">"#);
    for entry in entries.iter().rev() {
        html.push_str(&format!(
            r#"<div class="gallery-item" data-timestamp="{ts}">{image}<button type="button" class="image-action" data-action="delete" data-timestamp="{ts}" title="Hapus">✕</button></div>"#,
            ts = entry.timestamp,
            image = image_html(&entry.image, &entry.prompt, entry.timestamp),
        ));
    }
    html.push_str("</div>");
    html
}

pub fn typing_indicator_html() -> &'static str {
    r#"<div class="typing-indicator"><span class="dot"></span><span class="dot"></span><span class="dot"></span><span class="typing-label">Bot is typing...</span></div>"#
}

/// Web Audio snippet that plays [`REPLY_CUE`]. Errors stay inside the page.
pub fn cue_script() -> String {
    let beeps: String = REPLY_CUE
        .iter()
        .map(|tone| {
            format!(
                "beep({}, now + {}, {}, {});",
                tone.frequency_hz, tone.offset_secs, tone.duration_secs, tone.peak_gain
            )
        })
        .collect();
    format!(
        r#"try {{
  const AC = window.AudioContext || window.webkitAudioContext;
  window.__folioAudio = window.__folioAudio || new AC();
  const ctx = window.__folioAudio;
  if (ctx.state === 'suspended') {{ ctx.resume(); }}
  const beep = (freq, start, duration, peak) => {{
    const osc = ctx.createOscillator();
    const gain = ctx.createGain();
    osc.type = 'triangle';
    osc.frequency.setValueAtTime(freq, start);
    gain.gain.setValueAtTime(0.0001, start);
    gain.gain.exponentialRampToValueAtTime(peak, start + 0.02);
    gain.gain.exponentialRampToValueAtTime(0.0001, start + duration);
    osc.connect(gain).connect(ctx.destination);
    osc.start(start);
    osc.stop(start + duration + 0.02);
  }};
  const now = ctx.currentTime;
  {beeps}
}} catch (e) {{}}"#
    )
}

/// Scrolls the message list to its end marker once the next frame is laid out.
pub fn scroll_script(anchor_id: &str) -> String {
    format!(
        "requestAnimationFrame(() => document.getElementById('{}')?.scrollIntoView({{ behavior: 'smooth' }}));",
        anchor_id.replace('\'', "")
    )
}
