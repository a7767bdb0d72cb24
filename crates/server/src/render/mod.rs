//! Render sink: turns products into HTML.
//!
//! The full listing is a single [`ListingTemplate`]. Streamed listings are
//! rendered piecewise from the head, row and tail partials so that every
//! body chunk ends on a fragment boundary.

pub mod sink;
pub mod views;

pub use sink::{ByteChunker, HTML_CONTENT_TYPE, chunked_body, data_driven_body, html_stream};
pub use views::{
    FormTemplate, ListingHead, ListingQuery, ListingTail, ListingTemplate, Notice, PageHeader,
    ProductRow, ProductView,
};
