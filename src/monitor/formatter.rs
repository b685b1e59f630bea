use crate::error::ConfigError;

/// Template rendering a single numeric value into alert text
///
/// The template holds exactly one placeholder: `{}` for the plain value, or
/// `{:.N}` / `{:.Nf}` for a fixed number of decimals. A leading `,` in the
/// placeholder (`{:,}`, `{:,.2f}`) groups integer digits by thousands.
/// `{{` and `}}` are literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueFormatter {
    prefix: String,
    suffix: String,
    precision: Option<usize>,
    grouping: bool,
}

impl Default for ValueFormatter {
    fn default() -> Self {
        Self {
            prefix: String::new(),
            suffix: String::new(),
            precision: None,
            grouping: false,
        }
    }
}

impl ValueFormatter {
    pub fn parse(template: &str) -> Result<Self, ConfigError> {
        let invalid =
            |why: &str| ConfigError::ValidationError(format!("formatter '{}': {}", template, why));

        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut spec: Option<String> = None;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            let out = if spec.is_some() { &mut suffix } else { &mut prefix };
            match c {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    out.push('}');
                }
                '{' => {
                    if spec.is_some() {
                        return Err(invalid("more than one placeholder"));
                    }
                    let mut inner = String::new();
                    loop {
                        match chars.next() {
                            Some('}') => break,
                            Some(ch) => inner.push(ch),
                            None => return Err(invalid("unterminated placeholder")),
                        }
                    }
                    spec = Some(inner);
                }
                '}' => return Err(invalid("unmatched '}'")),
                other => out.push(other),
            }
        }

        let spec = spec.ok_or_else(|| invalid("missing '{}' placeholder"))?;
        let spec = match spec.strip_prefix(':') {
            Some(rest) => rest,
            None if spec.is_empty() => "",
            None => return Err(invalid("named or positional placeholders are not supported")),
        };
        let (grouping, spec) = match spec.strip_prefix(',') {
            Some(rest) => (true, rest),
            None => (false, spec),
        };
        let precision = match spec {
            "" => None,
            s => {
                let digits = s
                    .strip_prefix('.')
                    .map(|d| d.strip_suffix('f').unwrap_or(d))
                    .ok_or_else(|| invalid("unsupported format spec"))?;
                Some(
                    digits
                        .parse::<usize>()
                        .map_err(|_| invalid("precision must be a number"))?,
                )
            }
        };

        Ok(Self {
            prefix,
            suffix,
            precision,
            grouping,
        })
    }

    pub fn format(&self, value: f64) -> String {
        let rendered = match self.precision {
            Some(p) => format!("{:.*}", p, value),
            None => value.to_string(),
        };
        let rendered = if self.grouping {
            group_thousands(&rendered)
        } else {
            rendered
        };
        format!("{}{}{}", self.prefix, rendered, self.suffix)
    }
}

/// Insert `,` between groups of three integer digits
fn group_thousands(rendered: &str) -> String {
    let (sign, unsigned) = match rendered.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", rendered),
    };
    let (int_part, frac_part) = match unsigned.find('.') {
        Some(dot) => unsigned.split_at(dot),
        None => (unsigned, ""),
    };
    if !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return rendered.to_string();
    }

    let mut grouped = String::with_capacity(rendered.len() + int_part.len() / 3);
    grouped.push_str(sign);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped.push_str(frac_part);
    grouped
}
