// Pipeline Runner test module
#[cfg(test)]
mod offset_tests;
#[cfg(test)]
mod stop_tests;
