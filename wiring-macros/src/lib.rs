use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::quote;

use syn::parse::{Parse, ParseStream};
use syn::punctuated::Punctuated;
use syn::spanned::Spanned as _;
use syn::{
    Attribute, Data, DeriveInput, Error, Expr, FnArg, GenericArgument, Ident, ImplItem, ItemImpl,
    LitStr, Pat, PathArguments, Token, Type,
};

const INJECT_ATTR: &str = "inject";
const CONSTRUCTOR_ATTR: &str = "constructor";

fn extract_generic_type(ty: &Type, wrapper: &str) -> Option<Type> {
    if let Type::Path(type_path) = ty
        && let Some(segment) = type_path.path.segments.last()
        && segment.ident == wrapper
        && let PathArguments::AngleBracketed(args) = &segment.arguments
        && let Some(GenericArgument::Type(inner)) = args.args.first()
    {
        return Some(inner.clone());
    }
    None
}

/// How a constructor parameter is declared and read back.
enum ParamKind {
    /// `Arc<T>`: autowired service.
    Service(Type),
    /// `Option<Arc<T>>`: autowired service, null when unavailable.
    OptionalService(Type),
    /// Anything else: deserialized from a plain argument value.
    Value { nullable: bool },
}

fn classify(ty: &Type) -> ParamKind {
    if let Some(inner) = extract_generic_type(ty, "Arc") {
        return ParamKind::Service(inner);
    }
    if let Some(option) = extract_generic_type(ty, "Option") {
        if let Some(inner) = extract_generic_type(&option, "Arc") {
            return ParamKind::OptionalService(inner);
        }
        return ParamKind::Value { nullable: true };
    }
    ParamKind::Value { nullable: false }
}

#[derive(Default)]
struct InjectOptions {
    default: Option<Expr>,
    id: Option<LitStr>,
}

fn parse_inject_options(attrs: &[Attribute]) -> syn::Result<InjectOptions> {
    let mut options = InjectOptions::default();
    for attr in attrs {
        if !attr.path().is_ident(INJECT_ATTR) {
            continue;
        }
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("default") {
                options.default = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("id") {
                options.id = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error(format!("unsupported #[{INJECT_ATTR}] option")))
            }
        })?;
    }
    Ok(options)
}

/// `implements(dyn A, dyn B)`
struct Implements(Vec<Type>);

impl Parse for Implements {
    fn parse(input: ParseStream) -> syn::Result<Self> {
        if input.is_empty() {
            return Ok(Self(Vec::new()));
        }
        let ident: Ident = input.parse()?;
        if ident != "implements" {
            return Err(Error::new(ident.span(), "expected `implements(...)`"));
        }
        let content;
        syn::parenthesized!(content in input);
        let types = Punctuated::<Type, Token![,]>::parse_terminated(&content)?;
        Ok(Self(types.into_iter().collect()))
    }
}

fn parse_implements(attrs: &[Attribute]) -> syn::Result<Vec<Type>> {
    let mut interfaces = Vec::new();
    for attr in attrs {
        if attr.path().is_ident(INJECT_ATTR) {
            interfaces.extend(attr.parse_args::<Implements>()?.0);
        }
    }
    Ok(interfaces)
}

/// Generates the signature entry and the binding statement for one parameter.
fn parameter_tokens(
    ident: &Ident,
    ty: &Type,
    options: &InjectOptions,
) -> (TokenStream2, TokenStream2) {
    let name = ident.to_string();
    let name = name.strip_prefix("r#").unwrap_or(&name).to_string();
    let default = options
        .default
        .as_ref()
        .map(|expr| quote! { .with_default(::wiring::Value::from(#expr)) });
    let typed = |inner: &Type| match &options.id {
        Some(id) => quote! { ::wiring::Parameter::new(#name).with_type(#id) },
        None => quote! { ::wiring::Parameter::typed::<#inner>(#name) },
    };
    match classify(ty) {
        ParamKind::Service(inner) => {
            let parameter = typed(&inner);
            (
                quote! { #parameter #default },
                quote! { let #ident = args.service::<#inner>(#name)?; },
            )
        }
        ParamKind::OptionalService(inner) => {
            let parameter = typed(&inner);
            (
                quote! { #parameter.nullable() #default },
                quote! { let #ident = args.optional::<#inner>(#name)?; },
            )
        }
        ParamKind::Value { nullable } => {
            let nullable = nullable.then(|| quote! { .nullable() });
            (
                quote! { ::wiring::Parameter::new(#name) #nullable #default },
                quote! { let #ident = args.value::<#ty>(#name)?; },
            )
        }
    }
}

fn capabilities_tokens(interfaces: &[Type]) -> TokenStream2 {
    if interfaces.is_empty() {
        return quote! {};
    }
    quote! {
        fn capabilities(
            capabilities: ::wiring::Capabilities<Self>,
        ) -> ::wiring::Capabilities<Self> {
            capabilities
                #(.provide::<#interfaces>(
                    |this: ::std::sync::Arc<Self>| -> ::std::sync::Arc<#interfaces> { this }
                ))*
        }
    }
}

/// Derive macro for the `Injectable` trait.
///
/// Every named field becomes a constructor parameter: `Arc<T>` fields are
/// autowired as `T`, `Option<Arc<T>>` fields are optional services and all
/// other fields are deserialized from argument values.
///
/// Field options: `#[inject(default = expr)]` and `#[inject(id = "service")]`.
/// Interfaces are declared on the struct with `#[inject(implements(dyn Trait))]`.
#[proc_macro_derive(Injectable, attributes(inject))]
pub fn derive_injectable(input: TokenStream) -> TokenStream {
    let input = syn::parse_macro_input!(input as DeriveInput);
    handle_derive_injectable(input).unwrap_or_else(|e| e.to_compile_error().into())
}

/// Attribute macro for impl blocks with a `#[constructor]` method.
#[proc_macro_attribute]
pub fn injectable(attr: TokenStream, item: TokenStream) -> TokenStream {
    let implements = syn::parse_macro_input!(attr as Implements);
    if let Ok(item_impl) = syn::parse::<ItemImpl>(item) {
        return handle_injectable_impl(item_impl, implements.0)
            .unwrap_or_else(|e| e.to_compile_error().into());
    }
    TokenStream::from(
        Error::new(
            proc_macro2::Span::call_site(),
            "#[injectable] can only be applied to impl blocks",
        )
        .to_compile_error(),
    )
}

fn handle_derive_injectable(input: DeriveInput) -> syn::Result<TokenStream> {
    let name = &input.ident;
    let fields = match &input.data {
        Data::Struct(s) => &s.fields,
        _ => return Err(Error::new(name.span(), "Only structs are supported")),
    };
    let interfaces = parse_implements(&input.attrs)?;

    let mut parameters = Vec::new();
    let mut field_lets = Vec::new();
    let mut field_inits = Vec::new();

    match fields {
        syn::Fields::Named(fields) => {
            for field in &fields.named {
                let Some(field_ident) = field.ident.as_ref() else {
                    continue;
                };
                let options = parse_inject_options(&field.attrs)?;
                let (parameter, binding) = parameter_tokens(field_ident, &field.ty, &options);
                parameters.push(parameter);
                field_lets.push(binding);
                field_inits.push(quote! { #field_ident });
            }
        }
        syn::Fields::Unnamed(_) => {
            return Err(Error::new(name.span(), "Tuple structs are not supported"));
        }
        syn::Fields::Unit => {}
    }

    let capabilities = capabilities_tokens(&interfaces);

    Ok(quote! {
        impl ::wiring::Injectable for #name {
            fn signature() -> ::wiring::Signature {
                ::wiring::Signature::new()
                    #(.param(#parameters))*
            }

            fn construct(
                args: &::wiring::ResolvedArguments,
            ) -> ::std::result::Result<Self, ::wiring::StdError> {
                #(#field_lets)*
                Ok(Self {
                    #(#field_inits,)*
                })
            }

            #capabilities
        }
    }
    .into())
}

fn handle_injectable_impl(input: ItemImpl, interfaces: Vec<Type>) -> syn::Result<TokenStream> {
    if input.trait_.is_some() {
        return Err(Error::new(input.span(), "Trait impls are not supported"));
    }

    let self_ty = &input.self_ty;
    let mut constructor = None;

    for item in &input.items {
        if let ImplItem::Fn(method) = item {
            for attr in &method.attrs {
                if attr.path().is_ident(CONSTRUCTOR_ATTR) {
                    if constructor.is_some() {
                        return Err(Error::new(
                            attr.span(),
                            "Only one constructor method allowed",
                        ));
                    }
                    constructor = Some(method);
                }
            }
        }
    }

    let Some(method) = constructor else {
        return Err(Error::new(input.span(), "No constructor method found"));
    };

    if method.sig.asyncness.is_some() {
        return Err(Error::new(
            method.sig.span(),
            "Constructor method cannot be async",
        ));
    }

    let method_name = &method.sig.ident;
    let is_result = match &method.sig.output {
        syn::ReturnType::Default => {
            return Err(Error::new(
                method.sig.span(),
                "Constructor method must have a return type",
            ));
        }
        syn::ReturnType::Type(_, ty) => extract_generic_type(ty, "Result").is_some(),
    };

    let mut parameters = Vec::new();
    let mut arg_lets = Vec::new();
    let mut arg_names = Vec::new();
    let mut cleaned_inputs = Vec::new();

    for fn_arg in &method.sig.inputs {
        let pat_type = match fn_arg {
            FnArg::Receiver(_) => {
                return Err(Error::new(
                    fn_arg.span(),
                    "Constructor method cannot have self parameter",
                ));
            }
            FnArg::Typed(pat_type) => pat_type,
        };
        let Pat::Ident(pat_ident) = pat_type.pat.as_ref() else {
            return Err(Error::new(
                pat_type.pat.span(),
                "Only simple bindings supported",
            ));
        };
        let arg_name = &pat_ident.ident;
        let options = parse_inject_options(&pat_type.attrs)?;
        let (parameter, binding) = parameter_tokens(arg_name, &pat_type.ty, &options);
        parameters.push(parameter);
        arg_lets.push(binding);
        arg_names.push(quote! { #arg_name });

        // Create cleaned parameter without inject attributes
        let mut cleaned_pat_type = pat_type.clone();
        cleaned_pat_type
            .attrs
            .retain(|attr| !attr.path().is_ident(INJECT_ATTR));
        cleaned_inputs.push(FnArg::Typed(cleaned_pat_type));
    }

    // Create cleaned input with inject and constructor attributes removed
    let mut cleaned_input = input.clone();
    for item in &mut cleaned_input.items {
        if let ImplItem::Fn(method) = item
            && method
                .attrs
                .iter()
                .any(|attr| attr.path().is_ident(CONSTRUCTOR_ATTR))
        {
            method.sig.inputs = cleaned_inputs.into_iter().collect();
            method
                .attrs
                .retain(|attr| !attr.path().is_ident(CONSTRUCTOR_ATTR));
            break;
        }
    }

    let method_call = quote! { Self::#method_name(#(#arg_names),*) };
    let construct_body = if is_result {
        quote! {
            #(#arg_lets)*
            #method_call.map_err(::std::convert::Into::into)
        }
    } else {
        quote! {
            #(#arg_lets)*
            Ok(#method_call)
        }
    };
    let capabilities = capabilities_tokens(&interfaces);

    Ok(quote! {
        #cleaned_input

        impl ::wiring::Injectable for #self_ty {
            fn signature() -> ::wiring::Signature {
                ::wiring::Signature::new()
                    #(.param(#parameters))*
            }

            fn construct(
                args: &::wiring::ResolvedArguments,
            ) -> ::std::result::Result<Self, ::wiring::StdError> {
                #construct_body
            }

            #capabilities
        }
    }
    .into())
}
