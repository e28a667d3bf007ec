use nu_ansi_term::Style;
use std::fmt;
use std::time::Instant;

pub(crate) fn human_size(bytes: impl humansize::ToF64 + humansize::Unsigned) -> String {
    humansize::format_size(bytes, humansize::BINARY)
}

pub(crate) fn bold(value: &(impl fmt::Display + ?Sized)) -> String {
    Style::new().bold().paint(value.to_string()).to_string()
}

pub(crate) fn bold_human_size(bytes: impl humansize::ToF64 + humansize::Unsigned) -> String {
    bold(&human_size(bytes))
}

pub(crate) fn elapsed(start: Instant) -> String {
    format!("{:.2?}", start.elapsed())
}
