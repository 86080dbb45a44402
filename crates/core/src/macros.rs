/// Implements `Display` by delegating to a field or expression, saving a
/// boilerplate `impl fmt::Display` block for simple newtypes and records.
///
/// ```ignore
/// simple_display!(AgentId, |id| id.0.as_str());
/// ```
macro_rules! simple_display {
    ($ty:ty, |$self:ident| $body:expr) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let $self = self;
                write!(f, "{}", $body)
            }
        }
    };
}

pub(crate) use simple_display;
