use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    InvalidArgs,
    SessionFailed,
    OutputFailed,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::InvalidArgs => 2,
            ExitCode::SessionFailed => 10,
            ExitCode::OutputFailed => 20,
        }
    }
}

#[derive(Debug)]
pub struct ExitError {
    pub code: ExitCode,
    pub err: anyhow::Error,
}

impl ExitError {
    pub fn new(code: ExitCode, err: anyhow::Error) -> Self {
        Self { code, err }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.err.source()
    }
}

/// Process exit status for `err`. Errors not tagged with an [`ExitError`]
/// anywhere in their chain count as session failures.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    err.chain()
        .find_map(|e| e.downcast_ref::<ExitError>())
        .map(|exit| exit.code.as_i32())
        .unwrap_or(ExitCode::SessionFailed.as_i32())
}

pub fn invalid_args(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, anyhow::anyhow!(message.into())).into()
}

pub fn invalid_args_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, err).into()
}

pub fn output_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::OutputFailed, err).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn tagged_errors_keep_their_code_under_context() {
        let err = invalid_args("bad flag");
        assert_eq!(exit_code(&err), 2);

        let wrapped: anyhow::Result<()> = Err(output_err(anyhow::anyhow!("disk full")));
        let err = wrapped.context("writing export").expect_err("error");
        assert_eq!(exit_code(&err), 20);
    }

    #[test]
    fn untagged_errors_are_session_failures() {
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 10);
    }
}
