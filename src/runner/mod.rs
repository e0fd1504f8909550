pub mod quoting_loop;
