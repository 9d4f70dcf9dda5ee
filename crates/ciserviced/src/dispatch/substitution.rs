use cinet::CallInfo;

/// Placeholders recognised in command templates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Placeholder {
    /// `${number}`
    Number,
    /// `${areacode}`
    AreaCode,
    /// `${area}`
    Area,
    /// `${name}`
    Name,
    /// `${time}`
    Time,
    /// `${msn}`
    Msn,
    /// `${alias}`
    Alias,
    /// `${completenumber}`
    CompleteNumber,
}

impl Placeholder {
    /// Every placeholder, in table order.
    pub const ALL: [Self; 8] = [
        Self::Number,
        Self::AreaCode,
        Self::Area,
        Self::Name,
        Self::Time,
        Self::Msn,
        Self::Alias,
        Self::CompleteNumber,
    ];

    /// Literal token as written in templates.
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Number => "${number}",
            Self::AreaCode => "${areacode}",
            Self::Area => "${area}",
            Self::Name => "${name}",
            Self::Time => "${time}",
            Self::Msn => "${msn}",
            Self::Alias => "${alias}",
            Self::CompleteNumber => "${completenumber}",
        }
    }
}

/// Placeholder values for one ring event.
///
/// Built once per event and shared read-only by every query of that event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionTable {
    number: String,
    areacode: String,
    area: String,
    name: String,
    time: String,
    msn: String,
    alias: String,
    completenumber: String,
}

impl SubstitutionTable {
    /// Captures the placeholder values of `call`.
    #[must_use]
    pub fn from_call(call: &CallInfo) -> Self {
        Self {
            number: call.number.clone(),
            areacode: call.areacode.clone(),
            area: call.area.clone(),
            name: call.name.clone(),
            time: call.time.clone(),
            msn: call.msn.clone(),
            alias: call.alias.clone(),
            completenumber: call.completenumber.clone(),
        }
    }

    /// Raw value of `placeholder`.
    #[must_use]
    pub fn value(&self, placeholder: Placeholder) -> &str {
        match placeholder {
            Placeholder::Number => &self.number,
            Placeholder::AreaCode => &self.areacode,
            Placeholder::Area => &self.area,
            Placeholder::Name => &self.name,
            Placeholder::Time => &self.time,
            Placeholder::Msn => &self.msn,
            Placeholder::Alias => &self.alias,
            Placeholder::CompleteNumber => &self.completenumber,
        }
    }

    /// View replacing `${name}` with `name` when one is given.
    #[must_use]
    pub const fn with_name<'a>(&'a self, name: Option<&'a str>) -> SubstitutionView<'a> {
        SubstitutionView { table: self, name }
    }
}

/// A table seen through one query's optional name override.
#[derive(Debug, Clone, Copy)]
pub struct SubstitutionView<'a> {
    table: &'a SubstitutionTable,
    name: Option<&'a str>,
}

impl SubstitutionView<'_> {
    /// Value of `placeholder`, honouring the override.
    #[must_use]
    pub fn value(&self, placeholder: Placeholder) -> &str {
        match (placeholder, self.name) {
            (Placeholder::Name, Some(name)) => name,
            _ => self.table.value(placeholder),
        }
    }

    /// Replaces every placeholder in `template` with its shell-quoted value in
    /// a single left-to-right pass. Substituted text is never rescanned.
    #[must_use]
    pub fn expand(&self, template: &str) -> String {
        let mut expanded = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("${") {
            let (literal, candidate) = rest.split_at(start);
            expanded.push_str(literal);
            let matched = Placeholder::ALL
                .into_iter()
                .find(|placeholder| candidate.starts_with(placeholder.token()));
            let consumed = match matched {
                Some(placeholder) => {
                    expanded.push_str(&shell_quote(self.value(placeholder)));
                    placeholder.token().len()
                }
                None => {
                    expanded.push_str("${");
                    2
                }
            };
            rest = candidate.get(consumed..).unwrap_or_default();
        }
        expanded.push_str(rest);
        expanded
    }
}

/// Quotes `value` for a POSIX shell.
///
/// Words made only of ASCII alphanumerics and `+-./:@_` stay bare. Anything
/// else becomes one single-quoted word with each embedded `'` written as
/// `'\''`, and empty values become `''`. No double quotes are added, so
/// the result still splits when a template wraps the placeholder in double
/// quotes. NUL bytes cannot be passed to a process and are dropped.
#[must_use]
pub fn shell_quote(value: &str) -> String {
    let cleaned: String = value.chars().filter(|ch| *ch != '\0').collect();
    if !cleaned.is_empty() && cleaned.chars().all(is_bare_word_char) {
        return cleaned;
    }
    let mut quoted = String::with_capacity(cleaned.len() + 2);
    quoted.push('\'');
    for ch in cleaned.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

const fn is_bare_word_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || matches!(ch, '+' | '-' | '.' | '/' | ':' | '@' | '_')
}
