#[cfg(test)]
mod decoder_tests;
#[cfg(test)]
mod id_remap_tests;
#[cfg(test)]
mod id_table_tests;
#[cfg(test)]
mod mux_tests;
