#[cfg(test)]
mod injector_tests;
#[cfg(test)]
mod bean_tests;
