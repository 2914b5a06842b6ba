//! Derive macros for the sahabul booking platform.
//!
//! # Available Macros
//!
//! - `#[derive(Action)]` - generates helpers for action enums whose variants
//!   are marked `#[command]` (requests to change state) or `#[event]` (facts
//!   that happened and get persisted).
//!
//! # Example
//!
//! ```ignore
//! use sahabul_macros::Action;
//!
//! #[derive(Action, Clone, Debug)]
//! enum LedgerAction {
//!     #[command]
//!     CreateBooking { field_id: String },
//!
//!     #[event]
//!     BookingCreated { booking_id: String },
//! }
//!
//! // Generated methods:
//! assert!(LedgerAction::CreateBooking { field_id: "f".into() }.is_command());
//! assert!(LedgerAction::BookingCreated { booking_id: "b".into() }.is_event());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use proc_macro::TokenStream;
use quote::quote;
use syn::{Attribute, Data, DeriveInput, Fields, parse_macro_input};

/// Derive macro for Action enums.
///
/// Generates helper methods for action enums:
/// - `is_command()` - returns true if this variant is a command
/// - `is_event()` - returns true if this variant is an event
/// - `event_type()` - returns the stable event type name for serialization
///   (`Variant.v1`); commands return `"unknown"`
///
/// # Attributes
///
/// - `#[command]` - mark a variant as a command
/// - `#[event]` - mark a variant as an event
///
/// # Panics
///
/// Produces a compile error (not a runtime panic) if:
/// - applied to a non-enum type
/// - a variant carries both `#[command]` and `#[event]`
#[proc_macro_derive(Action, attributes(command, event))]
#[allow(clippy::expect_used)] // Proc macro panics become compile errors, not runtime panics
pub fn derive_action(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;

    let Data::Enum(data_enum) = &input.data else {
        return syn::Error::new_spanned(input, "#[derive(Action)] can only be used on enums")
            .to_compile_error()
            .into();
    };

    // Collect variants marked as commands or events
    let mut command_variants = Vec::new();
    let mut event_variants = Vec::new();

    for variant in &data_enum.variants {
        let variant_name = &variant.ident;
        let is_command = has_attribute(&variant.attrs, "command");
        let is_event = has_attribute(&variant.attrs, "event");

        if is_command && is_event {
            return syn::Error::new_spanned(
                variant,
                "Variant cannot be both #[command] and #[event]",
            )
            .to_compile_error()
            .into();
        }

        if is_command {
            command_variants.push(variant_name);
        }

        if is_event {
            event_variants.push(variant_name);
        }
    }

    // Map variant names to their field shapes for pattern generation
    let variant_map: std::collections::HashMap<_, _> = data_enum
        .variants
        .iter()
        .map(|v| (&v.ident, &v.fields))
        .collect();

    let is_command_arms = command_variants.iter().map(|variant| {
        let fields = variant_map.get(variant).expect("variant must exist in map");
        match fields {
            Fields::Named(_) => quote! { Self::#variant { .. } => true, },
            Fields::Unnamed(_) => quote! { Self::#variant(..) => true, },
            Fields::Unit => quote! { Self::#variant => true, },
        }
    });

    let is_event_arms = event_variants.iter().map(|variant| {
        let fields = variant_map.get(variant).expect("variant must exist in map");
        match fields {
            Fields::Named(_) => quote! { Self::#variant { .. } => true, },
            Fields::Unnamed(_) => quote! { Self::#variant(..) => true, },
            Fields::Unit => quote! { Self::#variant => true, },
        }
    });

    let event_type_arms = event_variants.iter().map(|variant| {
        let type_name = format!("{variant}.v1");
        let fields = variant_map.get(variant).expect("variant must exist in map");
        match fields {
            Fields::Named(_) => quote! { Self::#variant { .. } => #type_name, },
            Fields::Unnamed(_) => quote! { Self::#variant(..) => #type_name, },
            Fields::Unit => quote! { Self::#variant => #type_name, },
        }
    });

    let expanded = quote! {
        impl #name {
            /// Returns true if this action is a command
            #[must_use]
            pub const fn is_command(&self) -> bool {
                match self {
                    #(#is_command_arms)*
                    _ => false,
                }
            }

            /// Returns true if this action is an event
            #[must_use]
            pub const fn is_event(&self) -> bool {
                match self {
                    #(#is_event_arms)*
                    _ => false,
                }
            }

            /// Returns the event type name for serialization
            ///
            /// Only events have type names. Commands return "unknown".
            #[must_use]
            pub const fn event_type(&self) -> &'static str {
                match self {
                    #(#event_type_arms)*
                    _ => "unknown",
                }
            }
        }
    };

    TokenStream::from(expanded)
}

/// Check whether an attribute list contains a specific attribute.
fn has_attribute(attrs: &[Attribute], name: &str) -> bool {
    attrs.iter().any(|attr| attr.path().is_ident(name))
}
