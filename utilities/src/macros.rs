/// Asserts the expression is `Ok(_)` and evaluates to the contained value.
#[macro_export]
macro_rules! assert_ok {
	($result:expr) => {
		match $result {
			Ok(value) => value,
			Err(error) => panic!("expected Ok, got Err({:?}) from '{}'", error, stringify!($result)),
		}
	};
}

/// Asserts the expression is `Err(_)` and evaluates to the contained error.
#[macro_export]
macro_rules! assert_err {
	($result:expr) => {
		match $result {
			Err(error) => error,
			Ok(value) => panic!("expected Err, got Ok({:?}) from '{}'", value, stringify!($result)),
		}
	};
}
