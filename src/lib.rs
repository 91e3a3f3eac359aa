//! Embed terminal sessions into host surfaces.
//!
//! A [`part::PartLoader`] instantiates a terminal part on a fresh
//! [`surface::Surface`]; [`service::SessionManager`] starts ssh or a local
//! shell in it and records the pair in a [`service::SessionRegistry`], which
//! forgets the session as soon as the surface is destroyed. Input is forwarded
//! by surface id. [`ffi`] exposes the same operations over a C ABI.

pub mod catalog;
pub mod config;
pub mod ffi;
pub mod part;
pub mod service;
pub mod surface;
