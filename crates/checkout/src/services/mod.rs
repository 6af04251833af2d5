//! Outbound service ports and their in-memory test implementations.

pub mod crm;
pub mod distributor;
pub mod ffl;
pub mod payment;

pub use crm::{CrmError, CrmSync, InMemoryCrm};
pub use distributor::{
    DistributorError, DistributorService, InMemoryDistributorService, SubmissionOutcome,
};
pub use ffl::{FflDirectory, FflDirectoryError, FflRecord, InMemoryFflDirectory};
pub use payment::{CaptureOutcome, InMemoryPaymentGateway, PaymentError, PaymentGateway};
