//! Rust source back end.
//!
//! Renders each [`DecodeLoop`] as a plain struct plus an implementation of
//! the runtime's `DecodeMessage` trait whose `merge_from` is a single
//! `match` over field numbers.

use proc_macro2::{Ident, Literal, TokenStream};
use quote::{format_ident, quote};

use protodec::WireType;

use crate::context::{to_pascal_case, to_rust_field_name, to_rust_module_name, GenerationContext};
use crate::plan::{Arm, DecodeLoop, ElementCount, EntryField, FieldStep, MapStep, MessageRef, ReadOp, StoreOp};
use crate::Error;

/// Renders every plan into one token stream.
pub fn render_module(ctx: &GenerationContext, plans: &[DecodeLoop]) -> Result<TokenStream, Error> {
    let mut tokens = TokenStream::new();
    for plan in plans {
        tokens.extend(render_message(ctx, plan)?);
    }
    Ok(tokens)
}

/// Formats rendered tokens as source text, validating that they parse as a
/// Rust file.
pub fn format_tokens(tokens: TokenStream, skip_format: bool) -> Result<String, Error> {
    let file: syn::File = syn::parse2(tokens.clone())?;
    if skip_format {
        Ok(tokens.to_string())
    } else {
        Ok(prettyplease::unparse(&file))
    }
}

/// Renders the struct, oneof enums and decoder of one message.
pub fn render_message(ctx: &GenerationContext, plan: &DecodeLoop) -> Result<TokenStream, Error> {
    let struct_name = format_ident!("{}", plan.rust_name);
    let mod_name = format_ident!("{}", to_rust_module_name(&plan.rust_name));
    let runtime = &ctx.runtime;

    let mut fields = Vec::new();
    // (oneof name, [(variant, type)])
    let mut oneofs: Vec<(String, Vec<(Ident, TokenStream)>)> = Vec::new();

    for arm in &plan.arms {
        match arm {
            Arm::Field(step) => {
                let field = format_ident!("{}", step.rust_name);
                let value = value_type(&step.read)?;
                let ty = match &step.store {
                    StoreOp::Assign => value,
                    StoreOp::SetSome => quote!(::core::option::Option<#value>),
                    StoreOp::MergeMessage { boxed: false } => quote!(::core::option::Option<#value>),
                    StoreOp::MergeMessage { boxed: true } => {
                        quote!(::core::option::Option<::std::boxed::Box<#value>>)
                    }
                    StoreOp::Push => quote!(::std::vec::Vec<#value>),
                    StoreOp::SelectOneof {
                        oneof,
                        variant,
                        boxed,
                    } => {
                        let variant = format_ident!("{}", variant);
                        let value = if *boxed {
                            quote!(::std::boxed::Box<#value>)
                        } else {
                            value
                        };
                        if let Some((_, variants)) = oneofs.iter_mut().find(|(name, _)| name == oneof) {
                            variants.push((variant, value));
                            continue;
                        }
                        oneofs.push((oneof.clone(), vec![(variant, value)]));

                        let field = format_ident!("{}", to_rust_field_name(oneof));
                        let enum_name = format_ident!("{}", to_pascal_case(oneof));
                        fields.push(quote! {
                            pub #field: ::core::option::Option<#mod_name::#enum_name>,
                        });
                        continue;
                    }
                };
                fields.push(quote!(pub #field: #ty,));
            }
            Arm::Map(step) => {
                let field = format_ident!("{}", step.rust_name);
                let key = value_type(&step.key.read)?;
                let value = value_type(&step.value.read)?;
                fields.push(quote! {
                    pub #field: ::std::collections::BTreeMap<#key, #value>,
                });
            }
        }
    }

    if plan.preserve_unknown {
        fields.push(quote!(pub unknown_fields: ::std::vec::Vec<u8>,));
    }
    if plan.has_extensions() {
        fields.push(quote!(pub extensions: #runtime::Extensions,));
    }

    let oneof_mod = if oneofs.is_empty() {
        quote!()
    } else {
        let enums = oneofs.iter().map(|(name, variants)| {
            let enum_name = format_ident!("{}", to_pascal_case(name));
            let variants = variants.iter().map(|(variant, ty)| quote!(#variant(#ty),));
            quote! {
                #[derive(Debug, Clone, PartialEq)]
                pub enum #enum_name {
                    #(#variants)*
                }
            }
        });
        quote! {
            pub mod #mod_name {
                #[allow(unused_imports)]
                use super::*;
                #(#enums)*
            }
        }
    };

    let doc = format!(" Decoded form of `{}`.", plan.message);
    let decoder = render_decoder(ctx, plan)?;

    Ok(quote! {
        #[doc = #doc]
        #[derive(Debug, Clone, Default, PartialEq)]
        pub struct #struct_name {
            #(#fields)*
        }

        #oneof_mod

        #decoder
    })
}

/// Renders the `DecodeMessage` implementation of one message.
pub fn render_decoder(ctx: &GenerationContext, plan: &DecodeLoop) -> Result<TokenStream, Error> {
    let runtime = &ctx.runtime;
    let error_type = &ctx.error_type;
    let struct_name = format_ident!("{}", plan.rust_name);
    let full_name = &plan.message;
    let mod_name = format_ident!("{}", to_rust_module_name(&plan.rust_name));

    let arms = plan
        .arms
        .iter()
        .map(|arm| match arm {
            Arm::Field(step) => render_field_arm(ctx, &mod_name, step),
            Arm::Map(step) => render_map_arm(ctx, step),
        })
        .collect::<Result<Vec<_>, _>>()?;

    let needs_start = plan.preserve_unknown || plan.has_extensions();
    let start = if needs_start {
        quote!(let start = cur.position();)
    } else {
        quote!()
    };

    let extension_arm = plan
        .extension_ranges
        .iter()
        .map(|range| {
            let lo = Literal::u32_unsuffixed(range.start);
            let hi = Literal::u32_unsuffixed(range.end);
            quote!((#lo..#hi).contains(&n))
        })
        .reduce(|a, b| quote!(#a || #b))
        .map(|condition| {
            quote! {
                n if #condition => {
                    cur.skip_value(wire_type)?;
                    self.extensions.append(n, cur.raw_since(start));
                }
            }
        });

    let unknown = if plan.preserve_unknown {
        quote! {
            cur.skip_value(wire_type)?;
            self.unknown_fields.extend_from_slice(cur.raw_since(start));
        }
    } else {
        quote! {
            cur.skip_value(wire_type)?;
        }
    };

    let (required_init, required_check) = if plan.required.count > 0 {
        let words = Literal::usize_unsuffixed(plan.required.words());
        let count = Literal::usize_unsuffixed(plan.required.count);
        (
            quote! {
                let mut required = #runtime::RequiredFieldBitset::<#words>::new();
            },
            quote! {
                if required.first_missing(#count).is_some() {
                    return ::core::result::Result::Err(#error_type::required_field_missing(Self::NAME));
                }
            },
        )
    } else {
        (quote!(), quote!())
    };

    Ok(quote! {
        impl #runtime::DecodeMessage for #struct_name {
            const NAME: &'static str = #full_name;

            fn merge_from(
                &mut self,
                cur: &mut #runtime::DecodeCursor<'_>,
            ) -> ::core::result::Result<(), #error_type> {
                #required_init
                while cur.has_remaining() {
                    #start
                    let (number, wire_type) = cur.read_key()?;
                    match number {
                        #(#arms)*
                        #extension_arm
                        _ => {
                            #unknown
                        }
                    }
                }
                #required_check
                ::core::result::Result::Ok(())
            }
        }
    })
}

fn render_field_arm(ctx: &GenerationContext, mod_name: &Ident, step: &FieldStep) -> Result<TokenStream, Error> {
    let runtime = &ctx.runtime;
    let number = Literal::u32_unsuffixed(step.number);
    let expected = wire_type_tokens(ctx, step.wire_type);
    let mismatch = mismatch(ctx, &step.name);
    let cur = format_ident!("cur");
    let single = store_value(ctx, mod_name, step, &cur)?;
    let required = step.required_bit.map(|bit| {
        let bit = Literal::usize_unsuffixed(bit);
        quote!(required.set(#bit);)
    });

    let Some(packed) = &step.packed else {
        return Ok(quote! {
            #number => {
                if wire_type != #expected {
                    #mismatch;
                }
                #single
                #required
            }
        });
    };

    let block = format_ident!("packed");
    let element = store_value(ctx, mod_name, step, &block)?;
    let field = format_ident!("{}", step.rust_name);
    let count = match packed.count {
        ElementCount::VarintTerminators => {
            quote!(#runtime::packed::varint_element_count(packed.remaining_slice()))
        }
        ElementCount::FixedWidth(width) => {
            let width = Literal::usize_unsuffixed(width);
            quote!(#runtime::packed::fixed_element_count(packed.remaining_slice(), #width))
        }
        ElementCount::OnePerByte => {
            quote!(#runtime::packed::bool_element_count(packed.remaining_slice()))
        }
    };

    Ok(quote! {
        #number => match wire_type {
            #expected => {
                #single
            }
            #runtime::WireType::Len => {
                let mut packed = cur.read_packed()?;
                self.#field.reserve(#count);
                while packed.has_remaining() {
                    #element
                }
            }
            _ => #mismatch,
        },
    })
}

fn render_map_arm(ctx: &GenerationContext, step: &MapStep) -> Result<TokenStream, Error> {
    let runtime = &ctx.runtime;
    let number = Literal::u32_unsuffixed(step.number);
    let field = format_ident!("{}", step.rust_name);
    let mismatch = mismatch(ctx, &step.name);
    let entry = format_ident!("entry");

    let key_type = value_type(&step.key.read)?;
    let value_type_tokens = value_type(&step.value.read)?;
    let key_name = format!("{}.key", step.name);
    let value_name = format!("{}.value", step.name);

    let key_arm = entry_field_arm(ctx, &step.key, &entry, &key_name, &format_ident!("key"))?;
    let value_arm = entry_field_arm(ctx, &step.value, &entry, &value_name, &format_ident!("value"))?;

    let value_init = match &step.value.read {
        ReadOp::Message(target) => fresh_instance(ctx, target)?,
        _ => quote!(::core::default::Default::default()),
    };

    Ok(quote! {
        #number => {
            if wire_type != #runtime::WireType::Len {
                #mismatch;
            }
            let mut entry = cur.read_nested()?;
            let mut key: #key_type = ::core::default::Default::default();
            let mut value: #value_type_tokens = #value_init;
            while entry.has_remaining() {
                let (number, wire_type) = entry.read_key()?;
                match number {
                    1 => {
                        #key_arm
                    }
                    2 => {
                        #value_arm
                    }
                    _ => {
                        entry.skip_value(wire_type)?;
                    }
                }
            }
            self.#field.insert(key, value);
        }
    })
}

fn entry_field_arm(
    ctx: &GenerationContext,
    field: &EntryField,
    entry: &Ident,
    name: &str,
    slot: &Ident,
) -> Result<TokenStream, Error> {
    let expected = wire_type_tokens(ctx, field.wire_type);
    let mismatch = mismatch(ctx, name);
    let store = match &field.read {
        // Repeated occurrences of the value merge, as for any singular message.
        ReadOp::Message(target) => {
            let merge = merge_call(ctx, target, quote!(&mut #slot), quote!(&mut sub));
            quote! {
                let mut sub = #entry.read_nested()?;
                #merge?;
            }
        }
        read => {
            let value = value_expr(ctx, read, entry, name)?;
            quote!(#slot = #value;)
        }
    };
    Ok(quote! {
        if wire_type != #expected {
            #mismatch;
        }
        #store
    })
}

/// Statement storing one value read from `cursor` into the step's field.
fn store_value(
    ctx: &GenerationContext,
    mod_name: &Ident,
    step: &FieldStep,
    cursor: &Ident,
) -> Result<TokenStream, Error> {
    let runtime = &ctx.runtime;
    let field = format_ident!("{}", step.rust_name);

    Ok(match &step.store {
        StoreOp::Assign => {
            let value = value_expr(ctx, &step.read, cursor, &step.name)?;
            quote!(self.#field = #value;)
        }
        StoreOp::SetSome => {
            let value = value_expr(ctx, &step.read, cursor, &step.name)?;
            quote!(self.#field = ::core::option::Option::Some(#value);)
        }
        StoreOp::Push => {
            let value = value_expr(ctx, &step.read, cursor, &step.name)?;
            quote!(self.#field.push(#value);)
        }
        StoreOp::MergeMessage { boxed } => {
            let ReadOp::Message(target) = &step.read else {
                let value = value_expr(ctx, &step.read, cursor, &step.name)?;
                return Ok(quote!(self.#field = ::core::option::Option::Some(#value);));
            };
            let ty = rust_path(&target.rust_path)?;
            let init = match (target.pooled, boxed) {
                (false, _) => quote!(::core::default::Default::default),
                (true, false) => quote!(<#ty as #runtime::Pooled>::acquire),
                (true, true) => {
                    quote!(|| ::std::boxed::Box::new(<#ty as #runtime::Pooled>::acquire()))
                }
            };
            let target_expr = if *boxed {
                quote!(&mut **target)
            } else {
                quote!(target)
            };
            let merge = merge_call(ctx, target, target_expr, quote!(&mut sub));
            quote! {
                let mut sub = #cursor.read_nested()?;
                let target = self.#field.get_or_insert_with(#init);
                #merge?;
            }
        }
        StoreOp::SelectOneof {
            oneof,
            variant,
            boxed,
        } => {
            let oneof_field = format_ident!("{}", to_rust_field_name(oneof));
            let enum_name = format_ident!("{}", to_pascal_case(oneof));
            let variant = format_ident!("{}", variant);
            let value = value_expr(ctx, &step.read, cursor, &step.name)?;
            let value = if *boxed {
                quote!(::std::boxed::Box::new(#value))
            } else {
                value
            };
            quote! {
                self.#oneof_field = ::core::option::Option::Some(#mod_name::#enum_name::#variant(#value));
            }
        }
    })
}

/// Expression producing one freshly decoded value from `cursor`.
fn value_expr(ctx: &GenerationContext, read: &ReadOp, cursor: &Ident, name: &str) -> Result<TokenStream, Error> {
    let method = match read {
        ReadOp::Bool => "read_bool",
        ReadOp::Enum | ReadOp::Int32 => "read_int32",
        ReadOp::Int64 => "read_int64",
        ReadOp::Uint32 => "read_uint32",
        ReadOp::Uint64 => "read_uint64",
        ReadOp::Sint32 => "read_zigzag32",
        ReadOp::Sint64 => "read_zigzag64",
        ReadOp::Fixed32 => "read_fixed32",
        ReadOp::Fixed64 => "read_fixed64",
        ReadOp::Sfixed32 => "read_sfixed32",
        ReadOp::Sfixed64 => "read_sfixed64",
        ReadOp::Float => "read_float",
        ReadOp::Double => "read_double",
        ReadOp::String => {
            return Ok(quote!(::std::string::String::from(#cursor.read_string(#name)?)));
        }
        ReadOp::Bytes => return Ok(quote!(#cursor.read_bytes()?.to_vec())),
        ReadOp::Message(target) => {
            let init = fresh_instance(ctx, target)?;
            let merge = merge_call(ctx, target, quote!(&mut value), quote!(&mut sub));
            return Ok(quote! {{
                let mut sub = #cursor.read_nested()?;
                let mut value = #init;
                #merge?;
                value
            }});
        }
    };
    let method = format_ident!("{}", method);
    Ok(quote!(#cursor.#method()?))
}

fn fresh_instance(ctx: &GenerationContext, target: &MessageRef) -> Result<TokenStream, Error> {
    let runtime = &ctx.runtime;
    let ty = rust_path(&target.rust_path)?;
    Ok(if target.pooled {
        quote!(<#ty as #runtime::Pooled>::acquire())
    } else {
        quote!(<#ty as ::core::default::Default>::default())
    })
}

/// Call decoding the rest of `sub` into `target`. Well-known types go
/// through the shared generic decoder.
fn merge_call(ctx: &GenerationContext, message: &MessageRef, target: TokenStream, sub: TokenStream) -> TokenStream {
    let runtime = &ctx.runtime;
    if message.is_well_known() {
        quote!(#runtime::well_known::merge(#target, #sub))
    } else {
        quote!(#runtime::DecodeMessage::merge_from(#target, #sub))
    }
}

fn mismatch(ctx: &GenerationContext, name: &str) -> TokenStream {
    let error_type = &ctx.error_type;
    quote! {
        return ::core::result::Result::Err(#error_type::wire_type_mismatch(#name, wire_type.into_val()))
    }
}

fn wire_type_tokens(ctx: &GenerationContext, wire_type: WireType) -> TokenStream {
    let runtime = &ctx.runtime;
    let variant = match wire_type {
        WireType::Varint => "Varint",
        WireType::I64 => "I64",
        WireType::Len => "Len",
        WireType::SGroup => "SGroup",
        WireType::EGroup => "EGroup",
        WireType::I32 => "I32",
    };
    let variant = format_ident!("{}", variant);
    quote!(#runtime::WireType::#variant)
}

/// Native Rust type of one value.
fn value_type(read: &ReadOp) -> Result<TokenStream, Error> {
    Ok(match read {
        ReadOp::Bool => quote!(bool),
        ReadOp::Enum | ReadOp::Int32 | ReadOp::Sint32 | ReadOp::Sfixed32 => quote!(i32),
        ReadOp::Int64 | ReadOp::Sint64 | ReadOp::Sfixed64 => quote!(i64),
        ReadOp::Uint32 | ReadOp::Fixed32 => quote!(u32),
        ReadOp::Uint64 | ReadOp::Fixed64 => quote!(u64),
        ReadOp::Float => quote!(f32),
        ReadOp::Double => quote!(f64),
        ReadOp::String => quote!(::std::string::String),
        ReadOp::Bytes => quote!(::std::vec::Vec<u8>),
        ReadOp::Message(target) => {
            let path = rust_path(&target.rust_path)?;
            quote!(#path)
        }
    })
}

fn rust_path(path: &str) -> Result<syn::Path, Error> {
    Ok(syn::parse_str(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::schema::{FieldSpec, Kind, MessageSpec, Schema};
    use crate::synth::synthesize_message;

    fn render(schema: &Schema, config: &Config) -> String {
        let ctx = GenerationContext::new(config, schema).unwrap();
        let plans: Vec<_> = schema
            .messages
            .iter()
            .map(|m| synthesize_message(&ctx, m).unwrap())
            .collect();
        let tokens = render_module(&ctx, &plans).unwrap();
        format_tokens(tokens, false).unwrap()
    }

    #[test]
    fn test_render_scalar_and_repeated() {
        let schema = Schema::new("demo").message(
            MessageSpec::new("demo.Sample")
                .implicit_presence()
                .field(FieldSpec::new("id", 1, Kind::Int32))
                .field(FieldSpec::new("names", 2, Kind::String).repeated())
                .field(FieldSpec::new("scores", 3, Kind::Sint64).repeated()),
        );
        let source = render(&schema, &Config::new());

        assert!(source.contains("pub struct Sample"));
        assert!(source.contains("pub id: i32"));
        assert!(source.contains("pub names: ::std::vec::Vec<::std::string::String>"));
        assert!(source.contains("impl ::protodec::DecodeMessage for Sample"));
        assert!(source.contains("const NAME: &'static str = \"demo.Sample\";"));
        assert!(source.contains("cur.read_packed()?"));
        assert!(source.contains("::protodec::packed::varint_element_count"));
        assert!(source.contains("read_zigzag64"));
        assert!(source.contains("pub unknown_fields: ::std::vec::Vec<u8>"));
        // Strings are never packed.
        assert_eq!(source.matches("read_packed").count(), 1);
    }

    #[test]
    fn test_render_required_and_extensions() {
        let schema = Schema::new("demo").message(
            MessageSpec::new("demo.Req")
                .field(FieldSpec::new("a", 1, Kind::Int32).required())
                .extension_range(100, 200),
        );
        let source = render(&schema, &Config::new());

        assert!(source.contains("RequiredFieldBitset::<1>::new()"));
        assert!(source.contains("required.set(0);"));
        assert!(source.contains("required_field_missing(Self::NAME)"));
        assert!(source.contains("(100..200).contains(&n)"));
        assert!(source.contains("pub extensions: ::protodec::Extensions"));
    }

    #[test]
    fn test_render_uses_configured_runtime_path() {
        let schema = Schema::new("demo").message(
            MessageSpec::new("demo.M").field(FieldSpec::new("a", 1, Kind::Fixed32).optional()),
        );
        let mut config = Config::new();
        config.runtime_crate("crate::rt").preserve_unknown_fields(false);
        let source = render(&schema, &config);

        assert!(source.contains("impl crate::rt::DecodeMessage for M"));
        assert!(source.contains("crate::rt::DecodeError::wire_type_mismatch"));
        assert!(!source.contains("::protodec"));
        assert!(!source.contains("unknown_fields"));
        assert!(source.contains("pub a: ::core::option::Option<u32>"));
    }

    #[test]
    fn test_render_oneof_module() {
        let schema = Schema::new("demo").message(
            MessageSpec::new("demo.Shape")
                .field(FieldSpec::new("circle", 1, Kind::Double).oneof("kind"))
                .field(FieldSpec::new("label", 2, Kind::String).oneof("kind")),
        );
        let source = render(&schema, &Config::new());

        assert!(source.contains("pub kind: ::core::option::Option<shape::Kind>"));
        assert!(source.contains("pub mod shape"));
        assert!(source.contains("pub enum Kind"));
        assert!(source.contains("Circle(f64)"));
        assert!(source.contains("Label(::std::string::String)"));
    }
}
