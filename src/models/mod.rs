//! Data models module
//!
//! This module contains all data structures used throughout the application

pub mod amount;
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

// Re-export commonly used models
pub use user::{User, UserRole, CreateUserRequest, UpdateUserRequest, UpdateProfileRequest, LoginRequest, LoginResponse, ChangePasswordRequest};
pub use access_request::{AccessRequest, CreateAccessRequest, RequestStatus, ReviewDecision};
pub use role::{CooperativeRole, CreateRoleRequest, UpdateRoleRequest};
pub use supplier::{Supplier, CreateSupplierRequest, QualificationRequest, QualificationDocument, SupplierQualification, EligibilityStatus};
pub use substance::{Substance, CreateSubstanceRequest, UpdateSubstanceRequest, SubstanceRequest};
pub use raw_material::{RawMaterial, CreateRawMaterialRequest, UpdateRawMaterialRequest};
pub use marketplace::{MarketplaceOffer, OfferKind, OfferStatus, AuctionBid, Proposal, ProposalStatus, Transaction, TransactionStatus, TransactionSource, NewTransaction};
pub use flash_deal::{FlashDeal, FlashDealClaim, CreateFlashDealRequest};
pub use reserve::{StrategicReserveQuota, StrategicReserveClaim, CreateReserveQuotaRequest, QuotaStatus};
pub use financial::{FinancialMovement, MovementKind, CreateMovementRequest, Balance, FinancialSummary};
pub use quotation::{Quotation, QuotationResponse, QuotationStatus};
pub use notification::{Notification, NotificationPreference, NotificationEvent, Audience};
pub use transparency::{TransparencyNews, CreateNewsRequest, UpdateNewsRequest};
pub use voting::{Voting, VotingStatus, VotingBallot, VotingDecision, VotingResults};
pub use follow::{Follow, FollowTarget};
pub use file::StoredFile;
pub use setting::SystemSetting;
