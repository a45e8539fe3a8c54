use proc_macro::TokenStream;

mod m_ext_repr;
mod m_has_proceeder;

/// Implements `gre::resource::HasProceeder` on given struct.
///
/// The proceeder is either the field marked with `#[proceeder]`, or, if no field is marked, the
/// field named `proceeder`. Generic structs are supported.
///
/// **Note:** The macro assumes that the `gre` crate is present and usable.
///
/// ## Example
/// ```norun
/// use gre::resource::EventProceeder;
/// use gre_proc::HasProceeder;
///
/// #[derive(HasProceeder)]
/// struct Lamp {
///     #[proceeder]
///     events: EventProceeder,
///     lit: bool,
/// }
/// ```
#[proc_macro_derive(HasProceeder, attributes(proceeder))]
pub fn has_proceeder_derive(input: TokenStream) -> TokenStream {
    m_has_proceeder::has_proceeder_derive(input)
}

/// Extended `#[repr(T)]` macro. Aside from invoking normal `#[repr(T)], it creates the following
/// trait implementations:
///  * [`Into<T>`] for converting from self to repr type
///  * [`TryFrom<T>`] for converting from repr type to self
///  * [`Into<&str>`] for converting into the variant's name
///  * [`TryFrom<&str>`] for converting from the variant's name, ignoring ASCII case
///
/// **Note:** The macro assumes that `gre_utils` is present and usable.
///
/// ## Example
/// ```norun
/// use gre_proc::ext_repr;
///
/// #[ext_repr(u8)]
/// #[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// enum LightingMode {
///     None = 0,
///     PerVertex = 1,
///     PerFragment = 2,
/// }
///
/// assert_eq!(LightingMode::try_from(1u8), Ok(LightingMode::PerVertex));
/// let numeric: u8 = LightingMode::PerFragment.into();
/// assert_eq!(numeric, 2);
///
/// assert_eq!(LightingMode::try_from("none"), Ok(LightingMode::None));
/// let name: &'static str = LightingMode::PerVertex.into();
/// assert_eq!(name, "PerVertex");
/// ```
///
#[proc_macro_attribute]
pub fn ext_repr(input: TokenStream, source_item: TokenStream) -> TokenStream {
    m_ext_repr::ext_repr(input, source_item)
}
