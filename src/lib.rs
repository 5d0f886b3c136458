//! # Wayfare Documentation
//!
//! Travel packages marketing and booking site with an admin CMS.
//!
//! Packages, blogs, testimonials, bookings and auth all live in the backend REST
//! API. The site forwards JSON to and from it. The one part with its own logic is
//! image delivery, which lives in this workspace:
//!
//! - `imaging`: origin classifier, URL builder and the client image state machine
//! - `server`: image proxy, upload relay and placeholder service
//! - `audit`: CLI that probes stored references against a running site
//!
//! ## Notes
//!
//! ### Image references
//! - Stored as a single string on packages, blogs, SEO settings and CTA blocks
//! - Empty, absolute `http(s)` URL, or rooted at `/uploads/`
//! - Never rewritten in place, every render resolves it again
//!
//! ### Partner CDNs
//! - Several travel partners refuse cross-origin image reads
//! - Those hosts are listed in `CORS_PRONE_DOMAINS` and always go through the proxy
//! - Adding a partner is a deploy-time config change

pub mod frontend;
