//! UPnP/TR-064 client for FRITZ!Box-style home gateways.
//!
//! The gateway describes itself through XML documents: a device descriptor
//! listing a tree of devices and their services, and one SCPD document per
//! service listing its actions and state variables. [`Root::load`] fetches and
//! links the whole tree; [`Root::call`] invokes an action over SOAP and
//! decodes the response into typed values.
//!
//! Two independent descriptor trees exist: the always-available IGD tree and
//! the TR-064 tree, whose services usually require digest authentication.

pub mod action;
pub mod client;
pub mod root;

pub use action::{ActionResult, Value};
pub use client::SoapClient;
pub use root::{Action, Argument, Device, Root, Service, StateVariable};

/// Root-level IGD descriptor, served without authentication.
pub const IGD_DESCRIPTOR: &str = "igddesc.xml";

/// TR-064 descriptor; most of its services need credentials.
pub const TR064_DESCRIPTOR: &str = "tr64desc.xml";
