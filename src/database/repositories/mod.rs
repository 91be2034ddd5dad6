//! Database repositories module
//!
//! This module contains all repository implementations for data access.
//! Functions taking a `&mut PgConnection` are meant to run inside a
//! caller-owned transaction.

pub mod user;
pub mod access_request;
pub mod role;
pub mod supplier;
pub mod substance;
pub mod raw_material;
pub mod marketplace;
pub mod flash_deal;
pub mod reserve;
pub mod financial;
pub mod quotation;
pub mod notification;
pub mod transparency;
pub mod voting;
pub mod follow;
pub mod file;
pub mod setting;

// Re-export repositories
pub use user::{UserRepository, NewUser};
pub use access_request::AccessRequestRepository;
pub use role::RoleRepository;
pub use supplier::SupplierRepository;
pub use substance::SubstanceRepository;
pub use raw_material::RawMaterialRepository;
pub use marketplace::MarketplaceRepository;
pub use flash_deal::FlashDealRepository;
pub use reserve::ReserveRepository;
pub use financial::{FinancialRepository, purchase_debit, refund_credit};
pub use quotation::QuotationRepository;
pub use notification::NotificationRepository;
pub use transparency::NewsRepository;
pub use voting::VotingRepository;
pub use follow::FollowRepository;
pub use file::FileRepository;
pub use setting::SettingRepository;
