mod client;

pub use client::{parse_envelope, HttpListingApi, ListingApi};
