//! Parsing and validation of the create-proposal form before anything is sent to the program.

/// The program sizes proposal accounts for at most this many options.
pub const MAX_OPTIONS: usize = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum FormError {
    EmptyTitle,
    EmptyDescription,
    NoOptions,
    EmptyOption,
    TooManyOptions,
    InvalidStartTime,
    InvalidEndTime,
    EndsBeforeStart,
}

impl From<FormError> for &'static str {
    fn from(value: FormError) -> Self {
        match value {
            FormError::EmptyTitle => "Title is required",
            FormError::EmptyDescription => "Description is required",
            FormError::NoOptions => "At least one option is required",
            FormError::EmptyOption => "Options can't be blank",
            FormError::TooManyOptions => "A proposal can have at most 10 options",
            FormError::InvalidStartTime => "Start time must be a unix timestamp",
            FormError::InvalidEndTime => "End time must be a unix timestamp",
            FormError::EndsBeforeStart => "End time must be after start time",
        }
    }
}

impl core::fmt::Display for FormError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str((*self).into())
    }
}

impl std::error::Error for FormError {}

/// A validated create-proposal request.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProposalForm {
    pub title: String,
    pub description: String,
    pub options: Vec<String>,
    pub start_time: i64,
    pub end_time: i64,
}

impl ProposalForm {
    /// Parses raw form input. Options are comma-separated; surrounding whitespace is trimmed and
    /// empty entries are dropped.
    pub fn parse(
        title: &str,
        description: &str,
        options_csv: &str,
        start_time: &str,
        end_time: &str,
    ) -> Result<Self, FormError> {
        let options = options_csv
            .split(',')
            .map(str::trim)
            .filter(|option| !option.is_empty())
            .map(str::to_string)
            .collect();
        let start_time = start_time
            .trim()
            .parse()
            .or(Err(FormError::InvalidStartTime))?;
        let end_time = end_time
            .trim()
            .parse()
            .or(Err(FormError::InvalidEndTime))?;

        Self::new(title, description, options, start_time, end_time)
    }

    pub fn new(
        title: &str,
        description: &str,
        options: Vec<String>,
        start_time: i64,
        end_time: i64,
    ) -> Result<Self, FormError> {
        let title = title.trim();
        let description = description.trim();
        if title.is_empty() {
            return Err(FormError::EmptyTitle);
        }
        if description.is_empty() {
            return Err(FormError::EmptyDescription);
        }
        match options.len() {
            0 => return Err(FormError::NoOptions),
            n if n > MAX_OPTIONS => return Err(FormError::TooManyOptions),
            _ => {}
        }
        if options.iter().any(|option| option.trim().is_empty()) {
            return Err(FormError::EmptyOption);
        }
        if end_time <= start_time {
            return Err(FormError::EndsBeforeStart);
        }

        Ok(Self {
            title: title.to_string(),
            description: description.to_string(),
            options,
            start_time,
            end_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_options() {
        let form = ProposalForm::parse(
            "Upgrade DAO Treasury",
            "Increase the treasury allocation to 50%.",
            " Yes, No ,, Abstain ,",
            "1700000000",
            "1700604800",
        )
        .unwrap();
        assert_eq!(form.options, ["Yes", "No", "Abstain"]);
        assert_eq!(form.start_time, 1_700_000_000);
        assert_eq!(form.end_time, 1_700_604_800);
    }

    #[test]
    fn rejects_incomplete_forms() {
        let parse = |title, description, options, start, end| {
            ProposalForm::parse(title, description, options, start, end).unwrap_err()
        };
        assert_eq!(parse("  ", "d", "Yes", "1", "2"), FormError::EmptyTitle);
        assert_eq!(parse("t", "", "Yes", "1", "2"), FormError::EmptyDescription);
        assert_eq!(parse("t", "d", " , ,", "1", "2"), FormError::NoOptions);
        assert_eq!(parse("t", "d", "Yes", "soon", "2"), FormError::InvalidStartTime);
        assert_eq!(parse("t", "d", "Yes", "1", ""), FormError::InvalidEndTime);
        assert_eq!(parse("t", "d", "Yes", "5", "5"), FormError::EndsBeforeStart);
        assert_eq!(
            parse("t", "d", "a,b,c,d,e,f,g,h,i,j,k", "1", "2"),
            FormError::TooManyOptions
        );
    }

    #[test]
    fn blank_options_are_rejected_when_built_directly() {
        let new = |options: Vec<&str>| {
            ProposalForm::new(
                "t",
                "d",
                options.into_iter().map(str::to_string).collect(),
                1,
                2,
            )
        };
        assert_eq!(new(vec![""]), Err(FormError::EmptyOption));
        assert_eq!(new(vec!["Yes", "  "]), Err(FormError::EmptyOption));
        assert!(new(vec!["Yes", "No"]).is_ok());
    }
}
