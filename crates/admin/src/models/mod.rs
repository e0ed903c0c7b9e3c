//! Domain records owned by the back office.
//!
//! Pure pricing types (carts, prescriptions, lens matrices) live in
//! `optica_core`; these are the persisted records around them.

pub mod customer;
pub mod lens;
pub mod organization;
pub mod pagination;
pub mod product;
pub mod quote;
pub mod sale;
pub mod user;

pub use customer::{Customer, CustomerInput, PrescriptionInput, PrescriptionRecord};
pub use lens::{LensFamilyInput, LensMatrix, LensPriceRequest, SolutionsRequest};
pub use organization::{
    Branch, BranchInput, CascadeReport, Organization, OrganizationInput, OrganizationOverview,
    OrganizationUpdate,
};
pub use pagination::{Paginated, Pagination};
pub use product::{Product, ProductFilter, ProductInput};
pub use quote::{ConvertQuoteRequest, Quote, QuoteFilter, QuoteInput, QuoteStatusRequest};
pub use sale::{
    CartLineRequest, CartPreview, CartRequest, CheckoutRequest, PaymentRequest, PreviewLine, Sale,
    SaleFilter, SaleLine, SalePayment, SaleReceipt, VoidRequest,
};
pub use user::{CurrentUser, LoginRequest, User, UserInput, UserUpdate, session_keys};
