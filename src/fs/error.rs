//! Error codes shared by every filesystem layer.

use core::fmt;

pub type FsResult<T> = Result<T, FsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
	InvalidArgument,
	NameTooLong,
	PermissionDenied,
	IsADirectory,
	NotADirectory,
	NotFound,
	AlreadyExists,
	NoSpace,
	BadFileHandle,
	OutOfMemory,
	Io,
	Unsupported,
	Corrupted,
	Internal,
	Overflow,
}

impl FsError {
	pub fn as_str(&self) -> &'static str {
		match self {
			FsError::InvalidArgument => "invalid argument",
			FsError::NameTooLong => "name too long",
			FsError::PermissionDenied => "permission denied",
			FsError::IsADirectory => "is a directory",
			FsError::NotADirectory => "not a directory",
			FsError::NotFound => "not found",
			FsError::AlreadyExists => "already exists",
			FsError::NoSpace => "no space left on device",
			FsError::BadFileHandle => "bad file handle",
			FsError::OutOfMemory => "out of memory",
			FsError::Io => "input/output error",
			FsError::Unsupported => "operation not supported",
			FsError::Corrupted => "filesystem corrupted",
			FsError::Internal => "internal error",
			FsError::Overflow => "value out of range",
		}
	}

	/// Negative integer form for callers speaking the errno convention.
	pub fn errno(&self) -> i32 {
		match self {
			FsError::InvalidArgument => -22,
			FsError::NameTooLong => -36,
			FsError::PermissionDenied => -13,
			FsError::IsADirectory => -21,
			FsError::NotADirectory => -20,
			FsError::NotFound => -2,
			FsError::AlreadyExists => -17,
			FsError::NoSpace => -28,
			FsError::BadFileHandle => -9,
			FsError::OutOfMemory => -12,
			FsError::Io => -5,
			FsError::Unsupported => -95,
			FsError::Corrupted => -117,
			FsError::Internal => -131,
			FsError::Overflow => -75,
		}
	}
}

impl fmt::Display for FsError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
