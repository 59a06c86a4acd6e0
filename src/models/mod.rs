pub mod account;
pub mod settings;
pub mod ticket;
pub mod transaction;

pub use account::{Account, AccountRole};
pub use settings::{MealConfig, MealSettings, WindowCheck};
pub use ticket::{MealType, NewTicket, Ticket, TicketStatus};
pub use transaction::{NewTransaction, Transaction, TransactionKind, TransactionStatus};
