//! Per-chat prompt sequence that collects a [`DownloadRequest`].
//!
//! The wizard is a plain state machine: every state carries what has been
//! collected so far, and [`Conversation::handle`] maps one user input to
//! the replies to send plus, on the last step, the finished request.

use crate::download::{Category, DownloadRequest, FileRef, SourceKind};

use super::types::{InlineKeyboardButton, InlineKeyboardMarkup};

const MENU_TORRENT: &str = "menu:torrent";
const MENU_FILE: &str = "menu:file";
const CATEGORY_PREFIX: &str = "cat:";
const SOURCE_MAGNET: &str = "src:magnet";
const SOURCE_FILE: &str = "src:file";

/// What the user did, reduced to what the wizard cares about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// `/start`, `/torrent`, `/file` (without the slash or bot suffix)
    Command(String),
    /// Inline keyboard button press
    Action(String),
    Text(String),
    Document(FileRef),
    /// Any other message (stickers, photos, ...)
    Other,
}

impl Input {
    /// Classify a message text, treating `/cmd@botname args` as a command
    pub fn from_text(text: &str) -> Self {
        let trimmed = text.trim();
        match trimmed.strip_prefix('/') {
            Some(rest) if !rest.is_empty() => {
                let command = rest
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .split('@')
                    .next()
                    .unwrap_or_default();
                Input::Command(command.to_ascii_lowercase())
            }
            _ => Input::Text(trimmed.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Torrent,
    File,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum State {
    #[default]
    Idle,
    ChooseCategory {
        flow: Flow,
    },
    ChooseSource {
        category: Category,
    },
    AwaitPayload {
        category: Category,
        kind: SourceKind,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub keyboard: Option<InlineKeyboardMarkup>,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            keyboard: None,
        }
    }

    pub fn with_keyboard(text: impl Into<String>, keyboard: InlineKeyboardMarkup) -> Self {
        Self {
            text: text.into(),
            keyboard: Some(keyboard),
        }
    }
}

/// Result of feeding one input to a conversation
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Transition {
    pub replies: Vec<Reply>,
    pub request: Option<DownloadRequest>,
}

impl Transition {
    fn reply(reply: Reply) -> Self {
        Self {
            replies: vec![reply],
            request: None,
        }
    }

    fn silent() -> Self {
        Self::default()
    }
}

#[derive(Debug, Default)]
pub struct Conversation {
    state: State,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn handle(&mut self, input: Input, first_name: &str) -> Transition {
        // Entry points work from any state and restart the wizard
        match &input {
            Input::Command(command) if command == "start" => {
                self.state = State::Idle;
                return Transition::reply(main_menu(first_name));
            }
            Input::Command(command) if command == "torrent" => {
                return self.enter(Flow::Torrent);
            }
            Input::Command(command) if command == "file" => {
                return self.enter(Flow::File);
            }
            Input::Action(data) if data == MENU_TORRENT => return self.enter(Flow::Torrent),
            Input::Action(data) if data == MENU_FILE => return self.enter(Flow::File),
            Input::Text(text) if text.eq_ignore_ascii_case("abort") && self.state != State::Idle => {
                self.state = State::Idle;
                return Transition {
                    replies: vec![Reply::text("Aborting."), main_menu(first_name)],
                    request: None,
                };
            }
            _ => {}
        }

        match self.state.clone() {
            State::Idle => Transition::silent(),
            State::ChooseCategory { flow } => self.choose_category(flow, input),
            State::ChooseSource { category } => self.choose_source(category, input),
            State::AwaitPayload { category, kind } => self.take_payload(category, kind, input),
        }
    }

    fn enter(&mut self, flow: Flow) -> Transition {
        self.state = State::ChooseCategory { flow };
        Transition::reply(category_prompt())
    }

    fn choose_category(&mut self, flow: Flow, input: Input) -> Transition {
        let category = match &input {
            Input::Action(data) => data
                .strip_prefix(CATEGORY_PREFIX)
                .and_then(|name| name.parse::<Category>().ok()),
            _ => None,
        };

        let Some(category) = category else {
            return Transition::reply(Reply::text("Please pick one of the directories above."));
        };

        match flow {
            Flow::Torrent => {
                self.state = State::ChooseSource { category };
                Transition::reply(Reply::with_keyboard(
                    "Is a .torrent file or a magnet URL?",
                    InlineKeyboardMarkup::row(vec![
                        InlineKeyboardButton::callback("Magnet 🧲", SOURCE_MAGNET),
                        InlineKeyboardButton::callback("File 📁", SOURCE_FILE),
                    ]),
                ))
            }
            Flow::File => {
                self.state = State::AwaitPayload {
                    category,
                    kind: SourceKind::DirectFile,
                };
                Transition::reply(Reply::text("Send the file: (or send \"abort\" to cancel)"))
            }
        }
    }

    fn choose_source(&mut self, category: Category, input: Input) -> Transition {
        match &input {
            Input::Action(data) if data == SOURCE_MAGNET => {
                self.state = State::AwaitPayload {
                    category,
                    kind: SourceKind::Magnet,
                };
                Transition::reply(Reply::text(
                    "Enter magnet URL (or send \"abort\" to cancel):",
                ))
            }
            Input::Action(data) if data == SOURCE_FILE => {
                self.state = State::AwaitPayload {
                    category,
                    kind: SourceKind::TorrentFile,
                };
                Transition::reply(Reply::text(
                    "Send the .torrent file (or send \"abort\" to cancel):",
                ))
            }
            _ => Transition::reply(Reply::text("Please choose Magnet or File above.")),
        }
    }

    fn take_payload(&mut self, category: Category, kind: SourceKind, input: Input) -> Transition {
        let document = match input {
            // A stale button press ends the wizard without a request
            Input::Action(_) | Input::Command(_) => {
                self.state = State::Idle;
                return Transition::silent();
            }
            Input::Document(file) => Some(file),
            Input::Text(text) if kind == SourceKind::Magnet => {
                self.state = State::Idle;
                return Transition {
                    replies: Vec::new(),
                    request: Some(DownloadRequest::magnet(category, text)),
                };
            }
            Input::Text(_) | Input::Other => None,
        };

        self.state = State::Idle;
        let request = match kind {
            SourceKind::Magnet => DownloadRequest::new(category, SourceKind::Magnet),
            SourceKind::TorrentFile => DownloadRequest::torrent_file(category, document),
            SourceKind::DirectFile => DownloadRequest::direct_file(category, document),
        };

        Transition {
            replies: Vec::new(),
            request: Some(request),
        }
    }
}

/// The top-level menu offered whenever the bot is idle
pub fn main_menu(first_name: &str) -> Reply {
    Reply::with_keyboard(
        format!("How can I help you, {}?", first_name),
        InlineKeyboardMarkup::row(vec![
            InlineKeyboardButton::callback("Download a torrent ⬇️", MENU_TORRENT),
            InlineKeyboardButton::callback("Download a file 📁", MENU_FILE),
        ]),
    )
}

fn category_prompt() -> Reply {
    Reply::with_keyboard(
        "In which directory will it be?",
        InlineKeyboardMarkup::row(
            Category::ALL
                .iter()
                .map(|category| {
                    InlineKeyboardButton::callback(
                        category.label(),
                        format!("{}{}", CATEGORY_PREFIX, category.as_str()),
                    )
                })
                .collect(),
        ),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(data: &str) -> Input {
        Input::Action(data.to_string())
    }

    #[test]
    fn test_input_from_text() {
        assert_eq!(Input::from_text("/start"), Input::Command("start".to_string()));
        assert_eq!(
            Input::from_text("/Torrent@media_bot now"),
            Input::Command("torrent".to_string())
        );
        assert_eq!(Input::from_text(" abort "), Input::Text("abort".to_string()));
        assert_eq!(Input::from_text("/"), Input::Text("/".to_string()));
    }

    #[test]
    fn test_start_shows_menu() {
        let mut conversation = Conversation::new();
        let transition = conversation.handle(Input::Command("start".to_string()), "Sam");

        assert_eq!(transition.replies.len(), 1);
        assert_eq!(transition.replies[0].text, "How can I help you, Sam?");
        let keyboard = transition.replies[0].keyboard.as_ref().unwrap();
        assert_eq!(keyboard.inline_keyboard[0].len(), 2);
        assert_eq!(conversation.state(), &State::Idle);
    }

    #[test]
    fn test_magnet_flow() {
        let mut conversation = Conversation::new();

        let transition = conversation.handle(action(MENU_TORRENT), "Sam");
        assert_eq!(transition.replies[0].text, "In which directory will it be?");
        let buttons = &transition.replies[0].keyboard.as_ref().unwrap().inline_keyboard[0];
        assert_eq!(buttons.len(), 4);
        assert_eq!(buttons[1].callback_data, "cat:tv");

        let transition = conversation.handle(action("cat:tv"), "Sam");
        assert_eq!(transition.replies[0].text, "Is a .torrent file or a magnet URL?");

        conversation.handle(action(SOURCE_MAGNET), "Sam");
        assert_eq!(
            conversation.state(),
            &State::AwaitPayload {
                category: Category::Tv,
                kind: SourceKind::Magnet
            }
        );

        let transition =
            conversation.handle(Input::Text("magnet:?xt=urn:btih:abc".to_string()), "Sam");
        assert_eq!(
            transition.request,
            Some(DownloadRequest::magnet(Category::Tv, "magnet:?xt=urn:btih:abc"))
        );
        assert_eq!(conversation.state(), &State::Idle);
    }

    #[test]
    fn test_torrent_file_flow_without_document() {
        let mut conversation = Conversation::new();
        conversation.handle(Input::Command("torrent".to_string()), "Sam");
        conversation.handle(action("cat:music"), "Sam");
        conversation.handle(action(SOURCE_FILE), "Sam");

        let transition = conversation.handle(Input::Text("here you go".to_string()), "Sam");
        let request = transition.request.unwrap();
        assert_eq!(request.source_kind, SourceKind::TorrentFile);
        assert_eq!(request.category, Category::Music);
        assert!(request.payload.is_none());
    }

    #[test]
    fn test_file_flow() {
        let mut conversation = Conversation::new();
        conversation.handle(action(MENU_FILE), "Sam");

        let transition = conversation.handle(action("cat:other"), "Sam");
        assert_eq!(
            transition.replies[0].text,
            "Send the file: (or send \"abort\" to cancel)"
        );

        let file = FileRef::new("BQAC", Some("file.mp4".to_string()));
        let transition = conversation.handle(Input::Document(file.clone()), "Sam");
        assert_eq!(
            transition.request,
            Some(DownloadRequest::direct_file(Category::Other, Some(file)))
        );
    }

    #[test]
    fn test_abort_returns_to_menu() {
        let mut conversation = Conversation::new();
        conversation.handle(action(MENU_TORRENT), "Sam");
        conversation.handle(action("cat:movie"), "Sam");

        let transition = conversation.handle(Input::Text("Abort".to_string()), "Sam");
        assert_eq!(transition.replies[0].text, "Aborting.");
        assert_eq!(transition.replies[1].text, "How can I help you, Sam?");
        assert!(transition.request.is_none());
        assert_eq!(conversation.state(), &State::Idle);
    }

    #[test]
    fn test_unexpected_input_keeps_step() {
        let mut conversation = Conversation::new();
        conversation.handle(action(MENU_TORRENT), "Sam");

        let transition = conversation.handle(Input::Text("movies please".to_string()), "Sam");
        assert!(transition.request.is_none());
        assert_eq!(
            conversation.state(),
            &State::ChooseCategory { flow: Flow::Torrent }
        );

        conversation.handle(action("cat:movie"), "Sam");
        conversation.handle(Input::Other, "Sam");
        assert_eq!(
            conversation.state(),
            &State::ChooseSource {
                category: Category::Movie
            }
        );
    }

    #[test]
    fn test_stale_button_leaves_silently() {
        let mut conversation = Conversation::new();
        conversation.handle(action(MENU_FILE), "Sam");
        conversation.handle(action("cat:tv"), "Sam");

        let transition = conversation.handle(action("cat:movie"), "Sam");
        assert!(transition.replies.is_empty());
        assert!(transition.request.is_none());
        assert_eq!(conversation.state(), &State::Idle);
    }

    #[test]
    fn test_menu_button_restarts_flow() {
        let mut conversation = Conversation::new();
        conversation.handle(action(MENU_TORRENT), "Sam");
        conversation.handle(action("cat:tv"), "Sam");

        conversation.handle(action(MENU_FILE), "Sam");
        assert_eq!(conversation.state(), &State::ChooseCategory { flow: Flow::File });
    }

    #[test]
    fn test_idle_ignores_chatter() {
        let mut conversation = Conversation::new();
        let transition = conversation.handle(Input::Text("hello".to_string()), "Sam");
        assert_eq!(transition, Transition::default());

        let transition = conversation.handle(Input::Text("abort".to_string()), "Sam");
        assert!(transition.replies.is_empty());
    }
}
