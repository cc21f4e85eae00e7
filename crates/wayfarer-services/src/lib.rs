//! External service clients: the ClamAV scanning daemon and the remote CDN
//! store. Both sit behind traits so the pipeline and the staging cache can be
//! tested without a daemon or network.

pub mod cdn;
pub mod scanner;

pub use cdn::{CdnClient, CdnError, RemoteStore, SignedCredential};
pub use scanner::{ClamAvScanner, Scanner};
