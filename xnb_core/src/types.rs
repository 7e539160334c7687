use std::fmt;

use crate::error::{Result, XnbError};

/// Deepest generic nesting accepted from a type string or a reader chain.
pub const MAX_TYPE_DEPTH: usize = 32;

/// Parsed .NET-style type descriptor.
///
/// `Microsoft.Xna.Framework.Content.ListReader`1[[System.Int32, mscorlib]]`
/// parses to name `Microsoft.Xna.Framework.Content.ListReader` with one
/// subtype named `System.Int32`. Assembly qualification after the first comma
/// is discarded. Two descriptors are equal when their names and subtypes are
/// equal, recursively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Type {
    pub name: String,
    pub subtypes: Vec<Type>,
    pub is_array: bool,
}

impl Type {
    /// A descriptor without generic arguments.
    pub fn simple(name: impl Into<String>) -> Self {
        let name = name.into();
        let is_array = name.ends_with("[]");
        Self {
            name,
            subtypes: Vec::new(),
            is_array,
        }
    }

    pub fn generic(name: impl Into<String>, subtypes: Vec<Type>) -> Self {
        let mut ty = Self::simple(name);
        ty.subtypes = subtypes;
        ty
    }

    pub fn parse(s: &str) -> Result<Self> {
        Self::parse_at(s, 0)
    }

    fn parse_at(s: &str, depth: usize) -> Result<Self> {
        if depth > MAX_TYPE_DEPTH {
            return Err(XnbError::TypeTooDeep(MAX_TYPE_DEPTH));
        }
        let s = s.trim();
        let (head, args) = match s.find('`') {
            Some(tick) => (&s[..tick], Some(&s[tick + 1..])),
            None => (s, None),
        };

        let name = head.split(',').next().unwrap_or_default().trim();
        if name.is_empty() {
            return Err(XnbError::InvalidTypeName(s.to_string()));
        }

        let subtypes = match args {
            Some(args) => parse_generic_args(args, s)?
                .into_iter()
                .map(|arg| Self::parse_at(arg, depth + 1))
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };

        Ok(Self::generic(name, subtypes))
    }

    /// Element type of an array descriptor such as `System.Int32[]`.
    pub fn array_element(&self) -> Option<Type> {
        self.name.strip_suffix("[]").map(Type::simple)
    }
}

/// Split `N[[A, asm],[B, asm]]` into the bracketed argument bodies `A, asm`
/// and `B, asm`. Anything after the closing outer bracket (the assembly of
/// the generic type itself) is ignored.
fn parse_generic_args<'a>(args: &'a str, whole: &str) -> Result<Vec<&'a str>> {
    let malformed = || XnbError::InvalidTypeName(whole.to_string());

    let open = match args.find('[') {
        Some(open) => open,
        None => return Ok(Vec::new()),
    };
    if !args[..open].chars().all(|c| c.is_ascii_digit()) {
        return Err(malformed());
    }

    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut arg_start = None;
    for (i, c) in args.char_indices().skip_while(|&(i, _)| i < open) {
        match c {
            '[' => {
                depth += 1;
                if depth == 2 {
                    arg_start = Some(i + 1);
                }
            }
            ']' => {
                match depth {
                    0 => return Err(malformed()),
                    1 => return Ok(out),
                    2 => {
                        let start = arg_start.take().ok_or_else(malformed)?;
                        out.push(&args[start..i]);
                    }
                    _ => {}
                }
                depth -= 1;
            }
            _ if depth == 1 && !(c == ',' || c.is_whitespace()) => return Err(malformed()),
            _ => {}
        }
    }
    Err(malformed())
}

impl fmt::Display for Type {
    /// Canonical form: `Name`K[[Sub1],[Sub2]]`, or just `Name` without
    /// generic arguments.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.subtypes.is_empty() {
            return Ok(());
        }
        write!(f, "`{}[", self.subtypes.len())?;
        for (i, sub) in self.subtypes.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "[{sub}]")?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_assembly_qualified_generic() {
        let ty = Type::parse(
            "Microsoft.Xna.Framework.Content.DictionaryReader`2[[System.String, mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089],[System.Int32, mscorlib]]",
        )
        .unwrap();
        assert_eq!(ty.name, "Microsoft.Xna.Framework.Content.DictionaryReader");
        assert_eq!(ty.subtypes, vec![Type::simple("System.String"), Type::simple("System.Int32")]);
        assert!(!ty.is_array);
    }

    #[test]
    fn parses_nested_generics() {
        let ty = Type::parse(
            "Microsoft.Xna.Framework.Content.ListReader`1[[System.Collections.Generic.List`1[[System.Int32, mscorlib]], mscorlib]]",
        )
        .unwrap();
        assert_eq!(ty.subtypes.len(), 1);
        let inner = &ty.subtypes[0];
        assert_eq!(inner.name, "System.Collections.Generic.List");
        assert_eq!(inner.subtypes, vec![Type::simple("System.Int32")]);
    }

    #[test]
    fn strips_assembly_and_detects_arrays() {
        let ty = Type::parse("System.Int32[], mscorlib").unwrap();
        assert_eq!(ty.name, "System.Int32[]");
        assert!(ty.is_array);
        assert_eq!(ty.array_element(), Some(Type::simple("System.Int32")));
    }

    #[test]
    fn display_is_canonical() {
        let ty = Type::generic(
            "A",
            vec![Type::simple("B"), Type::generic("C", vec![Type::simple("D")])],
        );
        assert_eq!(ty.to_string(), "A`2[[B],[C`1[[D]]]]");
        assert_eq!(Type::parse(&ty.to_string()).unwrap(), ty);
    }

    #[test]
    fn rejects_unbalanced_brackets() {
        assert!(matches!(
            Type::parse("A`1[[B]"),
            Err(XnbError::InvalidTypeName(_))
        ));
        assert!(matches!(Type::parse(""), Err(XnbError::InvalidTypeName(_))));
    }

    #[test]
    fn rejects_excessive_nesting() {
        let mut s = String::from("X");
        for _ in 0..(MAX_TYPE_DEPTH + 2) {
            s = format!("G`1[[{s}]]");
        }
        assert!(matches!(Type::parse(&s), Err(XnbError::TypeTooDeep(_))));
    }

    fn arb_type() -> impl Strategy<Value = Type> {
        let leaf = "[A-Z][a-zA-Z0-9.]{0,12}".prop_map(Type::simple);
        leaf.prop_recursive(4, 24, 3, |inner| {
            ("[A-Z][a-zA-Z0-9.]{0,12}", prop::collection::vec(inner, 1..3))
                .prop_map(|(name, subs)| Type::generic(name, subs))
        })
    }

    proptest! {
        #[test]
        fn display_then_parse_round_trips(ty in arb_type()) {
            prop_assert_eq!(Type::parse(&ty.to_string()).unwrap(), ty);
        }
    }
}
