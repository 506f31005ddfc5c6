//! Newtype handles for runtime resources allocated during compilation.
//!
//! Each id is a dense u32 assigned by a monotonic counter, so compiling the
//! same source twice yields the same allocation (emitted output is
//! byte-stable).

macro_rules! define_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
        pub struct $name(u32);

        impl $name {
            #[inline]
            pub fn from_raw(index: u32) -> Self {
                Self(index)
            }

            #[inline]
            pub fn as_u32(self) -> u32 {
                self.0
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id! {
    /// A global integer variable: fake player `<scoreboard><n>` on the main
    /// objective.
    SlotId
}

define_id! {
    /// A per-attribute scoreboard objective for entity integer fields.
    EntityObjId
}

define_id! {
    /// An allocated command tag (instance identity or boolean field).
    TagId
}

define_id! {
    /// A registered entity template.
    TemplateId
}

define_id! {
    /// A registered struct template.
    StructId
}

define_id! {
    /// A registered function definition.
    FuncId
}

define_id! {
    /// A loaded module (source unit or builtin).
    ModuleId
}
