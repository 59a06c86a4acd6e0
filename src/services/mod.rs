pub mod account;
pub mod auth;
pub mod gateway;
pub mod payload;
pub mod payment;
pub mod scheduler;
pub mod settings;
pub mod ticket;
pub mod wallet;

pub use account::AccountService;
pub use auth::AuthService;
pub use gateway::{HttpGateway, PaymentGateway};
pub use payment::PaymentService;
pub use scheduler::SchedulerService;
pub use settings::{SettingsService, SettingsSource};
pub use ticket::TicketService;
pub use wallet::WalletLedger;
