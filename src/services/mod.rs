//! Service layer: external integrations and multi-step business operations.
//!
//! Route handlers stay thin and call into these modules for anything that
//! spans several tables or talks to a third party.

pub mod accounts;
pub mod ai_client;
pub mod blog;
pub mod cache;
pub mod catalog;
pub mod handelsregister;
pub mod orders;
pub mod partner_verifier;
pub mod partners;
pub mod settings;
pub mod sitemap;
pub mod stock;
pub mod stripe;
pub mod vat;
pub mod verification_job;
pub mod warehouse;
pub mod whois;

pub use ai_client::AiClient;
pub use cache::RedisCache;
pub use partner_verifier::PartnerVerifier;
pub use stripe::StripeClient;
pub use verification_job::VerificationJob;
