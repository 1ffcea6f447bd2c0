use std::collections::BTreeSet;

const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Allocates short identifiers (`_0`, `_1`, ... `_z`, `_10`, ...) that never
/// collide with a name used anywhere in the input code.
#[derive(Debug, Default)]
pub struct NameGenerator {
    prefix: String,
    next: u64,
    reserved: BTreeSet<String>,
}

impl NameGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: 0,
            reserved: BTreeSet::new(),
        }
    }

    /// Names the generator must skip.
    pub fn reserve<I, S>(&mut self, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reserved.extend(names.into_iter().map(Into::into));
    }

    pub fn generate(&mut self) -> String {
        loop {
            let name = format!("{}{}", self.prefix, base36(self.next));
            self.next += 1;
            if !self.reserved.contains(&name) {
                return name;
            }
        }
    }
}

fn base36(mut n: u64) -> String {
    let mut buf = Vec::new();
    loop {
        buf.push(DIGITS[(n % 36) as usize]);
        n /= 36;
        if n == 0 {
            break;
        }
    }
    buf.reverse();
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_base36_sequence() {
        let mut names = NameGenerator::new("_");
        let generated: Vec<_> = (0..38).map(|_| names.generate()).collect();
        assert_eq!(generated[0], "_0");
        assert_eq!(generated[9], "_9");
        assert_eq!(generated[10], "_a");
        assert_eq!(generated[35], "_z");
        assert_eq!(generated[36], "_10");
        assert_eq!(generated[37], "_11");
    }

    #[test]
    fn skips_reserved_names() {
        let mut names = NameGenerator::new("_");
        names.reserve(["_0", "_2"]);
        assert_eq!(names.generate(), "_1");
        assert_eq!(names.generate(), "_3");
    }
}
