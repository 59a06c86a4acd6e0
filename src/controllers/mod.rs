pub mod account;
pub mod admin;
pub mod payment;
pub mod settings;
pub mod ticket;
pub mod wallet;

use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    account::configure(cfg);
    wallet::configure(cfg);
    payment::configure(cfg);
    ticket::configure(cfg);
    settings::configure(cfg);
    admin::configure(cfg);
}
