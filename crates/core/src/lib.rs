pub mod action;
pub mod backend;
pub mod connection_manager;
pub mod controller;
pub mod form;
pub mod html;
pub mod profiles;
pub mod provider;
pub mod request_builder;
pub mod request_tokens;
pub mod session;
pub mod settings;
pub mod view_model;
pub mod wire;

pub use action::{perform, Call, Completion, Pending};
pub use backend::{ApiBackend, ApiError};
pub use controller::{GuardError, Notice, NoticeLevel, ViewStateController};
pub use session::Session;
pub use settings::ClientSettings;
pub use view_model::ViewModel;
