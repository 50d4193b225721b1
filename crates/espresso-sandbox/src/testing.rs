//! Guest programs for exercising the sandbox
//!
//! Small WASI commands in WebAssembly text form. Wasmtime compiles text and
//! binary modules alike, so these can be served through any
//! [`ModuleSource`](crate::ModuleSource) in place of a real build artifact.

/// Opens `input.esp` read-only under the root preopen and copies it to stdout.
/// Exits 2 if the file cannot be opened.
pub const ECHO_INPUT: &str = r#"
(module
  (import "wasi_snapshot_preview1" "path_open"
    (func $path_open (param i32 i32 i32 i32 i32 i64 i64 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_read"
    (func $fd_read (param i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_write"
    (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "input.esp")
  (func (export "_start")
    (if (i32.ne
          (call $path_open
            (i32.const 3) (i32.const 0) (i32.const 0) (i32.const 9)
            (i32.const 0) (i64.const 2) (i64.const 0) (i32.const 0) (i32.const 16))
          (i32.const 0))
      (then (call $proc_exit (i32.const 2))))
    (i32.store (i32.const 32) (i32.const 1024))
    (i32.store (i32.const 36) (i32.const 4096))
    (drop (call $fd_read (i32.load (i32.const 16)) (i32.const 32) (i32.const 1) (i32.const 40)))
    (i32.store (i32.const 36) (i32.load (i32.const 40)))
    (drop (call $fd_write (i32.const 1) (i32.const 32) (i32.const 1) (i32.const 44)))))
"#;

/// Writes each argv entry to stdout followed by a newline.
pub const PRINT_ARGS: &str = r#"
(module
  (import "wasi_snapshot_preview1" "args_sizes_get"
    (func $args_sizes_get (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "args_get"
    (func $args_get (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_write"
    (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (func (export "_start")
    (local $i i32)
    (local $size i32)
    (drop (call $args_sizes_get (i32.const 0) (i32.const 4)))
    (drop (call $args_get (i32.const 1024) (i32.const 2048)))
    (local.set $size (i32.load (i32.const 4)))
    (block $done
      (loop $scan
        (br_if $done (i32.ge_u (local.get $i) (local.get $size)))
        (if (i32.eqz (i32.load8_u (i32.add (i32.const 2048) (local.get $i))))
          (then (i32.store8 (i32.add (i32.const 2048) (local.get $i)) (i32.const 10))))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $scan)))
    (i32.store (i32.const 16) (i32.const 2048))
    (i32.store (i32.const 20) (local.get $size))
    (drop (call $fd_write (i32.const 1) (i32.const 16) (i32.const 1) (i32.const 24)))))
"#;

/// Prints `oops` to stderr and exits with status 3.
pub const FAIL_WITH_STDERR: &str = r#"
(module
  (import "wasi_snapshot_preview1" "fd_write"
    (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "oops\n")
  (func (export "_start")
    (i32.store (i32.const 16) (i32.const 0))
    (i32.store (i32.const 20) (i32.const 5))
    (drop (call $fd_write (i32.const 2) (i32.const 16) (i32.const 1) (i32.const 24)))
    (call $proc_exit (i32.const 3))))
"#;

/// Creates `scratch` exclusively; exits with the errno if that is refused.
pub const CREATE_SCRATCH: &str = r#"
(module
  (import "wasi_snapshot_preview1" "path_open"
    (func $path_open (param i32 i32 i32 i32 i32 i64 i64 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "scratch")
  (func (export "_start")
    (local $errno i32)
    (local.set $errno
      (call $path_open
        (i32.const 3) (i32.const 0) (i32.const 0) (i32.const 7)
        (i32.const 5) (i64.const -1) (i64.const -1) (i32.const 0) (i32.const 16)))
    (if (local.get $errno)
      (then (call $proc_exit (local.get $errno))))))
"#;

/// Hits `unreachable` immediately.
pub const TRAP: &str = r#"
(module
  (memory (export "memory") 1)
  (func (export "_start") unreachable))
"#;

/// Calls an import no host provides.
pub const CALLS_UNKNOWN_IMPORT: &str = r#"
(module
  (import "env" "mystery" (func $mystery))
  (memory (export "memory") 1)
  (func (export "_start") (call $mystery)))
"#;

/// Tries to grow memory by five pages; exits 7 when refused.
pub const GROW_MEMORY: &str = r#"
(module
  (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
  (memory (export "memory") 1)
  (func (export "_start")
    (if (i32.eq (memory.grow (i32.const 5)) (i32.const -1))
      (then (call $proc_exit (i32.const 7))))))
"#;

/// Tries to grow `input.esp` to 1 TiB, first through a writable handle and
/// then through a read-only one, and to write far past its end. Exits 100+
/// if any of it succeeds, otherwise with the errno of the refused resize.
pub const GROW_INPUT: &str = r#"
(module
  (import "wasi_snapshot_preview1" "path_open"
    (func $path_open (param i32 i32 i32 i32 i32 i64 i64 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_filestat_set_size"
    (func $set_size (param i32 i64) (result i32)))
  (import "wasi_snapshot_preview1" "fd_seek"
    (func $fd_seek (param i32 i64 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_write"
    (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
  (memory (export "memory") 1)
  (data (i32.const 0) "input.esp")
  (func (export "_start")
    (local $errno i32)
    (if (i32.eqz
          (call $path_open
            (i32.const 3) (i32.const 0) (i32.const 0) (i32.const 9)
            (i32.const 0) (i64.const -1) (i64.const -1) (i32.const 0) (i32.const 16)))
      (then
        (if (i32.eqz (call $set_size (i32.load (i32.const 16)) (i64.const 0x10000000000)))
          (then (call $proc_exit (i32.const 100))))))
    (local.set $errno
      (call $path_open
        (i32.const 3) (i32.const 0) (i32.const 0) (i32.const 9)
        (i32.const 0) (i64.const 2) (i64.const 0) (i32.const 0) (i32.const 16)))
    (if (local.get $errno)
      (then (call $proc_exit (local.get $errno))))
    (local.set $errno (call $set_size (i32.load (i32.const 16)) (i64.const 0x10000000000)))
    (if (i32.eqz (local.get $errno))
      (then (call $proc_exit (i32.const 101))))
    (drop (call $fd_seek
      (i32.load (i32.const 16)) (i64.const 0x10000000000) (i32.const 0) (i32.const 24)))
    (i32.store (i32.const 32) (i32.const 0))
    (i32.store (i32.const 36) (i32.const 1))
    (if (i32.eqz (call $fd_write
          (i32.load (i32.const 16)) (i32.const 32) (i32.const 1) (i32.const 40)))
      (then (call $proc_exit (i32.const 102))))
    (call $proc_exit (local.get $errno))))
"#;

/// Writes 8 KiB to stdout twice, ignoring errors.
pub const FLOOD_STDOUT: &str = r#"
(module
  (import "wasi_snapshot_preview1" "fd_write"
    (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (func (export "_start")
    (i32.store (i32.const 0) (i32.const 1024))
    (i32.store (i32.const 4) (i32.const 8192))
    (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))
    (drop (call $fd_write (i32.const 1) (i32.const 0) (i32.const 1) (i32.const 8)))))
"#;

/// Imports the preview-1 surface a wasi-libc command links against and walks
/// libc's startup: argv and environ sizes, preopen discovery, a directory
/// scan. Prints the preopen name; exits 10+ if startup fails or the
/// directory turns out to be writable.
pub const LIBC_STARTUP: &str = r#"
(module
  (import "wasi_snapshot_preview1" "args_get" (func (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "args_sizes_get"
    (func $args_sizes_get (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "environ_get" (func (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "environ_sizes_get"
    (func $environ_sizes_get (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "clock_time_get" (func (param i32 i64 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_close" (func (param i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_fdstat_get" (func (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_fdstat_set_flags" (func (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_filestat_get" (func (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_prestat_get"
    (func $fd_prestat_get (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_prestat_dir_name"
    (func $fd_prestat_dir_name (param i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_read" (func (param i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_readdir"
    (func $fd_readdir (param i32 i32 i32 i64 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_seek" (func (param i32 i64 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "fd_write"
    (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "path_create_directory"
    (func $path_create_directory (param i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "path_filestat_get"
    (func (param i32 i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "path_open"
    (func (param i32 i32 i32 i32 i32 i64 i64 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "path_unlink_file" (func (param i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "poll_oneoff" (func (param i32 i32 i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "random_get" (func (param i32 i32) (result i32)))
  (import "wasi_snapshot_preview1" "sched_yield" (func (result i32)))
  (import "wasi_snapshot_preview1" "proc_exit" (func $proc_exit (param i32)))
  (memory (export "memory") 1)
  (data (i32.const 200) "tmp")
  (func (export "_start")
    (local $len i32)
    (drop (call $args_sizes_get (i32.const 80) (i32.const 84)))
    (drop (call $environ_sizes_get (i32.const 88) (i32.const 92)))
    (if (call $fd_prestat_get (i32.const 3) (i32.const 0))
      (then (call $proc_exit (i32.const 10))))
    (local.set $len (i32.load (i32.const 4)))
    (if (call $fd_prestat_dir_name (i32.const 3) (i32.const 32) (local.get $len))
      (then (call $proc_exit (i32.const 11))))
    (drop (call $fd_readdir
      (i32.const 3) (i32.const 1024) (i32.const 512) (i64.const 0) (i32.const 16)))
    (if (i32.eqz (call $path_create_directory (i32.const 3) (i32.const 200) (i32.const 3)))
      (then (call $proc_exit (i32.const 12))))
    (i32.store8 (i32.add (i32.const 32) (local.get $len)) (i32.const 10))
    (i32.store (i32.const 64) (i32.const 32))
    (i32.store (i32.const 68) (i32.add (local.get $len) (i32.const 1)))
    (drop (call $fd_write (i32.const 1) (i32.const 64) (i32.const 1) (i32.const 72)))))
"#;
