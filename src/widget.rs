//! Floating chat widget.
//!
//! Markup comes from [`crate::render`]; clicks on image controls inside that
//! markup are forwarded back through a single `eval` channel.

use crate::ai::{ChatBackend, FolioAI};
use crate::config::Settings;
use crate::image::{ImageClient, ImageGenerator};
use crate::orchestrator::{AudioError, ChatOrchestrator, UiEffects};
use crate::render::{cue_script, gallery_html, lightbox_html, message_html, scroll_script, typing_indicator_html};
use crate::store::KeyValueSlot;
use crate::types::{InlineImage, unix_ms};
use dioxus::events::Key;
use dioxus::prelude::*;
use serde::Deserialize;
use std::sync::Arc;

const WIDGET_ROOT_ID: &str = "folio-widget";
const END_ANCHOR_ID: &str = "folio-chat-end";

const WIDGET_CSS: &str = r#"
#folio-widget { position: fixed; right: 1.5rem; bottom: 1.5rem; z-index: 50; font-family: system-ui, sans-serif; }
#folio-widget .toggle { width: 3.5rem; height: 3.5rem; border-radius: 50%; border: none; background: #2563eb; color: #fff; font-size: 1.5rem; cursor: pointer; }
#folio-widget .panel { position: absolute; right: 0; bottom: 4.5rem; width: 24rem; max-width: calc(100vw - 2rem); height: 34rem; display: flex; flex-direction: column; background: #fff; color: #111; border-radius: 1rem; box-shadow: 0 10px 30px rgba(0,0,0,.2); overflow: hidden; }
#folio-widget .panel-header { display: flex; align-items: center; justify-content: space-between; padding: .75rem 1rem; background: #2563eb; color: #fff; }
#folio-widget .status { font-size: .75rem; opacity: .85; }
#folio-widget .status::before { content: ""; display: inline-block; width: .5rem; height: .5rem; margin-right: .35rem; border-radius: 50%; background: #22c55e; }
#folio-widget .tabs { display: flex; border-bottom: 1px solid #e5e7eb; }
#folio-widget .tab { flex: 1; padding: .5rem; border: none; background: none; cursor: pointer; }
#folio-widget .tab.active { border-bottom: 2px solid #2563eb; font-weight: 600; }
#folio-widget .chat-list, #folio-widget .gallery-wrap { flex: 1; overflow-y: auto; padding: .75rem; }
#folio-widget .message-row { display: flex; flex-direction: column; margin-bottom: .75rem; }
#folio-widget .message-row.user { align-items: flex-end; }
#folio-widget .bubble { max-width: 85%; padding: .5rem .75rem; border-radius: .75rem; }
#folio-widget .bubble.user { background: #2563eb; color: #fff; }
#folio-widget .bubble.bot { background: #f3f4f6; }
#folio-widget .bubble.failed { background: #fef2f2; color: #991b1b; }
#folio-widget .message-timestamp { font-size: .7rem; color: #6b7280; margin-top: .2rem; }
#folio-widget .chat-image { position: relative; margin: .5rem 0 0; }
#folio-widget .chat-image img { width: 100%; border-radius: .5rem; cursor: zoom-in; }
#folio-widget .image-overlay { position: absolute; top: .35rem; right: .35rem; display: flex; gap: .25rem; }
#folio-widget .image-action { background: rgba(0,0,0,.55); color: #fff; border: none; border-radius: .35rem; padding: .15rem .4rem; cursor: pointer; text-decoration: none; }
#folio-widget .gallery { display: grid; grid-template-columns: repeat(2, 1fr); gap: .5rem; }
#folio-widget .gallery-item { position: relative; }
#folio-widget .typing-indicator { font-size: .8rem; color: #6b7280; padding: 0 .75rem .5rem; }
#folio-widget .composer { display: flex; gap: .5rem; padding: .75rem; border-top: 1px solid #e5e7eb; }
#folio-widget .composer textarea { flex: 1; resize: none; border: 1px solid #d1d5db; border-radius: .5rem; padding: .5rem; }
#folio-widget .lightbox { position: fixed; inset: 0; background: rgba(0,0,0,.85); display: flex; flex-direction: column; align-items: center; justify-content: center; cursor: zoom-out; }
#folio-widget .lightbox img { max-width: 90vw; max-height: 80vh; }
#folio-widget .lightbox-caption { color: #fff; margin-top: .75rem; }
"#;

/// Forwards clicks on `data-action` controls inside the widget. Downloads are
/// left to the browser.
const ACTION_BRIDGE: &str = r#"
document.addEventListener('click', (event) => {
  const control = event.target.closest('#folio-widget [data-action]');
  if (!control) return;
  const action = control.dataset.action;
  if (action === 'download' || action === 'close') return;
  const holder = control.closest('[data-timestamp]');
  if (!holder) return;
  event.preventDefault();
  dioxus.send({ action, timestamp: Number(holder.dataset.timestamp) });
});
"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WidgetTab {
    Chat,
    Gallery,
}

#[derive(Debug, Deserialize)]
struct ImageAction {
    action: String,
    timestamp: i64,
}

/// Adapters the widget talks to.
#[derive(Clone)]
pub struct Services {
    pub backend: Arc<dyn ChatBackend>,
    pub images: Arc<dyn ImageGenerator>,
}

impl Services {
    /// `FOLIO_CHAT_URL` selects a deployed `/chat` route; otherwise Gemini is
    /// called directly.
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            backend: Arc::new(FolioAI::from_settings(settings)),
            images: Arc::new(ImageClient::from_settings(settings)),
        }
    }

    fn from_env() -> Self {
        let settings = Settings::from_env().unwrap_or_else(|err| {
            tracing::warn!("{err}; using default settings");
            Settings::default()
        });
        Self::from_settings(&settings)
    }
}

/// Cue and scrolling through the webview.
#[derive(Clone, Copy, Debug, Default)]
pub struct WidgetEffects;

impl UiEffects for WidgetEffects {
    fn play_cue(&self) -> Result<(), AudioError> {
        let _ = document::eval(&cue_script());
        Ok(())
    }

    fn scroll_to_latest(&self) {
        let _ = document::eval(&scroll_script(END_ANCHOR_ID));
    }
}

fn default_slot() -> Arc<dyn KeyValueSlot> {
    #[cfg(not(target_arch = "wasm32"))]
    {
        Arc::new(crate::store::FileSlot::platform_default())
    }
    #[cfg(target_arch = "wasm32")]
    {
        Arc::new(crate::store::LocalStorageSlot::new())
    }
}

#[derive(Debug, thiserror::Error)]
enum CopyError {
    #[error("image data is not valid base64")]
    Decode,

    #[cfg(feature = "desktop")]
    #[error(transparent)]
    Image(#[from] ::image::ImageError),

    #[cfg(feature = "desktop")]
    #[error(transparent)]
    Clipboard(#[from] arboard::Error),
}

#[cfg(feature = "desktop")]
fn copy_image(image: &InlineImage) -> Result<(), CopyError> {
    let bytes = image.decode().ok_or(CopyError::Decode)?;
    let rgba = ::image::load_from_memory(&bytes)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_image(arboard::ImageData {
        width: width as usize,
        height: height as usize,
        bytes: std::borrow::Cow::Owned(rgba.into_raw()),
    })?;
    Ok(())
}

#[cfg(not(feature = "desktop"))]
fn copy_image(image: &InlineImage) -> Result<(), CopyError> {
    if image.decode().is_none() {
        return Err(CopyError::Decode);
    }
    let src = serde_json::to_string(image.as_str()).map_err(|_| CopyError::Decode)?;
    let _ = document::eval(&format!(
        r#"fetch({src}).then((res) => res.blob()).then((blob) => navigator.clipboard.write([new ClipboardItem({{ [blob.type]: blob }})])).catch(() => {{}});"#
    ));
    Ok(())
}

/// Standalone host page for the widget.
#[component]
pub fn App() -> Element {
    rsx! {
        main { style: "padding: 2rem; font-family: system-ui, sans-serif;",
            h1 { "Portfolio" }
            p { "Ask the assistant anything about the portfolio, or ask it to draw something." }
        }
        ChatWidget {}
    }
}

#[component]
pub fn ChatWidget() -> Element {
    let mut chat = use_signal(|| ChatOrchestrator::new(default_slot(), WidgetEffects));
    let services = use_signal(Services::from_env);
    let mut open = use_signal(|| false);
    let mut active_tab = use_signal(|| WidgetTab::Chat);
    let mut input = use_signal(String::new);
    let mut lightbox = use_signal(|| Option::<(InlineImage, String)>::None);

    let message_markup = use_memo(move || {
        chat.read()
            .messages()
            .iter()
            .map(|message| (message.id, message_html(message)))
            .collect::<Vec<_>>()
    });
    let gallery_markup = use_memo(move || gallery_html(chat.read().gallery()));

    use_future(move || async move {
        let mut bridge = document::eval(ACTION_BRIDGE);
        while let Ok(action) = bridge.recv::<ImageAction>().await {
            handle_image_action(action, chat, lightbox);
        }
    });

    let mut send_message = move |text: String| {
        let Some(dispatch) = chat.write().begin(&text) else {
            return;
        };
        input.set(String::new());
        let services = services.read().clone();
        spawn(async move {
            let outcome = dispatch
                .run(services.backend.as_ref(), services.images.as_ref())
                .await;
            chat.write().finish(outcome);
        });
    };

    let awaiting = chat.read().is_awaiting();
    let tab = active_tab();
    let toggle_title = if open() { "Tutup chat" } else { "Buka chat" };

    rsx! {
        style { dangerous_inner_html: WIDGET_CSS }
        div { id: WIDGET_ROOT_ID,
            if open() {
                div { class: "panel",
                    div { class: "panel-header",
                        div {
                            div { style: "font-weight: 600;", "Portfolio Assistant" }
                            div { class: "status", "Online" }
                        }
                        button {
                            class: "image-action", r#type: "button", title: "Hapus riwayat chat",
                            onclick: move |_| chat.write().clear_history(),
                            "🗑"
                        }
                    }
                    div { class: "tabs",
                        button {
                            class: tab_class(tab == WidgetTab::Chat),
                            onclick: move |_| active_tab.set(WidgetTab::Chat),
                            "Chat"
                        }
                        button {
                            class: tab_class(tab == WidgetTab::Gallery),
                            onclick: move |_| active_tab.set(WidgetTab::Gallery),
                            "Galeri"
                        }
                    }
                    if tab == WidgetTab::Chat {
                        div { class: "chat-list",
                            for (id, markup) in message_markup().into_iter() {
                                div { key: "{id}", dangerous_inner_html: "{markup}" }
                            }
                            div { id: END_ANCHOR_ID }
                        }
                        if awaiting {
                            div { dangerous_inner_html: typing_indicator_html() }
                        }
                        div { class: "composer",
                            textarea {
                                rows: "1", placeholder: "Ketik pesan...",
                                value: "{input}", oninput: move |ev| input.set(ev.value()),
                                onkeydown: move |ev| {
                                    if ev.key() == Key::Enter && !ev.modifiers().shift() {
                                        ev.prevent_default();
                                        send_message(input());
                                    }
                                },
                            }
                            button {
                                class: "toggle", r#type: "button", style: "width: 2.5rem; height: 2.5rem; font-size: 1rem;",
                                disabled: awaiting || input().trim().is_empty(),
                                onclick: move |_| send_message(input()),
                                "➤"
                            }
                        }
                    } else {
                        div { class: "gallery-wrap",
                            div { dangerous_inner_html: gallery_markup() }
                            if !chat.read().gallery().is_empty() {
                                button {
                                    class: "tab", r#type: "button",
                                    onclick: move |_| chat.write().clear_gallery(),
                                    "Hapus semua gambar"
                                }
                            }
                        }
                    }
                }
            }
            if let Some((image, prompt)) = lightbox() {
                div {
                    onclick: move |_| lightbox.set(None),
                    dangerous_inner_html: lightbox_html(&image, &prompt),
                }
            }
            button {
                class: "toggle", r#type: "button",
                title: toggle_title,
                onclick: move |_| open.set(!open()),
                if open() { "✕" } else { "💬" }
            }
        }
    }
}

fn tab_class(active: bool) -> &'static str {
    if active { "tab active" } else { "tab" }
}

fn handle_image_action(
    action: ImageAction,
    mut chat: Signal<ChatOrchestrator<WidgetEffects>>,
    mut lightbox: Signal<Option<(InlineImage, String)>>,
) {
    if action.action == "delete" {
        chat.write().delete_image(action.timestamp);
        return;
    }

    let found = {
        let chat = chat.read();
        chat.gallery()
            .iter()
            .find(|entry| entry.timestamp == action.timestamp)
            .map(|entry| (entry.image.clone(), entry.prompt.clone()))
            .or_else(|| {
                chat.messages().iter().find_map(|message| {
                    let image = message.image.as_ref()?;
                    (unix_ms(message.timestamp) == action.timestamp)
                        .then(|| (image.clone(), message.image_prompt.clone().unwrap_or_default()))
                })
            })
    };
    let Some((image, prompt)) = found else {
        tracing::debug!(timestamp = action.timestamp, "image action for an unknown image");
        return;
    };

    match action.action.as_str() {
        "enlarge" => lightbox.set(Some((image, prompt))),
        "copy" => {
            if let Err(err) = copy_image(&image) {
                tracing::warn!("copying image failed: {err}");
            }
        }
        other => tracing::debug!("ignoring image action {other}"),
    }
}
