/// Immutable lexical scope chain.
///
/// Every binding is a new head that borrows its parent, so scopes live on the
/// stack of whoever is compiling them and disappear with that frame. Lookup
/// walks outward and the innermost binding wins.
#[derive(Debug, Clone, Copy)]
pub struct Env<'a, T> {
    name: &'a str,
    value: T,
    parent: Option<&'a Env<'a, T>>,
}

impl<'a, T: Copy> Env<'a, T> {
    pub fn bind(name: &'a str, value: T, parent: Option<&'a Env<'a, T>>) -> Env<'a, T> {
        Env { name, value, parent }
    }

    pub fn lookup(env: Option<&Env<'a, T>>, name: &str) -> Option<T> {
        let mut current = env;
        while let Some(entry) = current {
            if entry.name == name {
                return Some(entry.value);
            }
            current = entry.parent;
        }
        None
    }
}
