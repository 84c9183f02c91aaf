// Copyright (c) The conventest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Prints to the current case's standard output, with a newline.
///
/// While a case runs, the output is captured and attached to the case's result. Outside a case,
/// it is printed to the process's standard output. Errors while writing are ignored, as with
/// [`println!`].
///
/// # Examples
///
/// ```
/// use conventest_runner::test_println;
///
/// test_println!("Console.Out: {}", "Pass");
/// ```
#[macro_export]
macro_rules! test_println {
    () => {
        $crate::test_println!("")
    };
    ($($arg:tt)*) => {{
        let _ = ::std::io::Write::write_fmt(
            &mut $crate::test_output::stdout(),
            ::std::format_args!("{}\n", ::std::format_args!($($arg)*)),
        );
    }};
}

/// Prints to the current case's standard error, with a newline.
///
/// See [`test_println!`] for how output is captured.
#[macro_export]
macro_rules! test_eprintln {
    () => {
        $crate::test_eprintln!("")
    };
    ($($arg:tt)*) => {{
        let _ = ::std::io::Write::write_fmt(
            &mut $crate::test_output::stderr(),
            ::std::format_args!("{}\n", ::std::format_args!($($arg)*)),
        );
    }};
}
