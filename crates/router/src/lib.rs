//! Eventcast - Router
//!
//! The single producer of the relay pipeline. The watch source invokes
//! the router's callbacks synchronously from its dispatch context; the
//! router normalizes the payload and hands it to the active sink's
//! `forward`, which enqueues and returns. The router itself holds no
//! buffering state - all buffering lives in the sink's relay channel.
//!
//! ```text
//! [Watch Source] --on_add/on_update/on_delete--> [EventRouter] --forward--> [Sink]
//! ```

mod router;

pub use router::{EventRouter, RouterMetrics, RouterSnapshot};
