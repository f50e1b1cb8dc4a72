//! # Trellis Macros
//!
//! Procedural macros for the Trellis framework.
//!
//! `#[controller]` turns an inherent `impl` block into a
//! `trellis_core::Controller` implementation: every `pub fn` taking a
//! receiver becomes an action, dispatched by name (ASCII case-insensitive).
//!
//! An action may take no arguments, the request `App`, or the `App` plus the
//! positional route arguments, and must return `trellis_core::Result<()>`.

use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;
use syn::spanned::Spanned;
use syn::{parse_macro_input, FnArg, ImplItem, ImplItemFn, ItemImpl, Type, Visibility};

/// Generate a `Controller` implementation from an impl block
///
/// # Usage
///
/// ```ignore
/// #[derive(Default)]
/// struct Blog;
///
/// #[controller]
/// impl Blog {
///     pub fn index(&mut self, app: &mut App<'_>) -> Result<()> {
///         app.echo("posts");
///         Ok(())
///     }
///
///     pub fn show(&mut self, app: &mut App<'_>, args: &[String]) -> Result<()> {
///         app.echo(&args[0]);
///         Ok(())
///     }
/// }
/// ```
#[proc_macro_attribute]
pub fn controller(_attr: TokenStream, item: TokenStream) -> TokenStream {
    let input = parse_macro_input!(item as ItemImpl);
    expand(&input).unwrap_or_else(syn::Error::into_compile_error).into()
}

fn expand(input: &ItemImpl) -> syn::Result<TokenStream2> {
    if input.trait_.is_some() {
        return Err(syn::Error::new(
            input.span(),
            "#[controller] goes on an inherent impl block",
        ));
    }
    if !input.generics.params.is_empty() {
        return Err(syn::Error::new(
            input.generics.span(),
            "#[controller] does not support generic controllers",
        ));
    }

    let self_ty = &input.self_ty;
    let controller_name = type_name(self_ty);

    let mut names = Vec::new();
    let mut arms = Vec::new();
    for method in input.items.iter().filter_map(action) {
        let ident = &method.sig.ident;
        let name = ident.to_string();
        let call = match method.sig.inputs.len() {
            1 => quote! { self.#ident() },
            2 => quote! { self.#ident(app) },
            3 => quote! { self.#ident(app, args) },
            _ => {
                return Err(syn::Error::new(
                    method.sig.inputs.span(),
                    "an action takes (&mut self), (&mut self, app) or (&mut self, app, args)",
                ))
            }
        };
        arms.push(quote! {
            if action.eq_ignore_ascii_case(#name) {
                return #call;
            }
        });
        names.push(name);
    }

    Ok(quote! {
        #input

        impl ::trellis_core::Controller for #self_ty {
            fn actions(&self) -> &'static [&'static str] {
                &[#(#names),*]
            }

            #[allow(unused_variables)]
            fn invoke(
                &mut self,
                action: &str,
                app: &mut ::trellis_core::App<'_>,
                args: &[::std::string::String],
            ) -> ::trellis_core::Result<()> {
                #(#arms)*
                ::core::result::Result::Err(::trellis_core::Error::MethodNotFound {
                    controller: ::std::string::String::from(#controller_name),
                    method: ::std::string::ToString::to_string(action),
                })
            }
        }
    })
}

/// Public methods with a receiver
fn action(item: &ImplItem) -> Option<&ImplItemFn> {
    let ImplItem::Fn(method) = item else {
        return None;
    };
    let public = matches!(method.vis, Visibility::Public(_));
    let has_receiver = matches!(method.sig.inputs.first(), Some(FnArg::Receiver(_)));
    (public && has_receiver).then_some(method)
}

fn type_name(ty: &Type) -> String {
    match ty {
        Type::Path(path) => path
            .path
            .segments
            .last()
            .map_or_else(String::new, |segment| segment.ident.to_string()),
        other => quote!(#other).to_string(),
    }
}
