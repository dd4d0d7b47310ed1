//! Y86 Simulator CLI
//!
//! Command-line driver: load a Mini-ELF file, print the requested
//! views, disassemble, and execute.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use y86_sim::disasm::{disassemble_code, disassemble_data, disassemble_rodata};
use y86_sim::dump::{dump_header, dump_memory, dump_phdrs};
use y86_sim::elf::{load_segment, ElfHeader, ProgramHeader, SegmentFlags, SegmentType, PHDR_SIZE};
use y86_sim::interp::execute;
use y86_sim::memory::{Memory, MEMSIZE};

/// Y86 simulator over Mini-ELF containers.
#[derive(Parser, Debug)]
#[command(name = "y86", disable_help_flag = true)]
struct Args {
    /// Display usage
    #[arg(short = 'h')]
    help: bool,

    /// Show the Mini-ELF header
    #[arg(short = 'H')]
    header: bool,

    /// Show all with brief memory
    #[arg(short = 'a')]
    all_brief: bool,

    /// Show all with full memory
    #[arg(short = 'f')]
    all_full: bool,

    /// Show the program headers
    #[arg(short = 's')]
    segments: bool,

    /// Show the memory contents (brief)
    #[arg(short = 'm')]
    membrief: bool,

    /// Show the memory contents (full)
    #[arg(short = 'M')]
    memfull: bool,

    /// Disassemble code contents
    #[arg(short = 'd')]
    disas_code: bool,

    /// Disassemble data contents
    #[arg(short = 'D')]
    disas_data: bool,

    /// Execute program
    #[arg(short = 'e')]
    exec_normal: bool,

    /// Execute program (trace mode)
    #[arg(short = 'E')]
    exec_trace: bool,

    /// Mini-ELF file to load
    file: Option<PathBuf>,
}

/// The effective option set after applying `-a`/`-f` implications.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Options {
    header: bool,
    segments: bool,
    membrief: bool,
    memfull: bool,
    disas_code: bool,
    disas_data: bool,
    exec_normal: bool,
    exec_trace: bool,
}

impl Options {
    /// Expand `-a`/`-f` and enforce the no-repetition rule: no option
    /// may be selected twice, explicitly or through an implication.
    fn resolve(args: &Args) -> Result<Self, ()> {
        let mut opts = Options {
            header: args.header,
            segments: args.segments,
            membrief: args.membrief,
            memfull: args.memfull,
            disas_code: args.disas_code,
            disas_data: args.disas_data,
            exec_normal: args.exec_normal,
            exec_trace: args.exec_trace,
        };

        if args.all_brief {
            if opts.header || opts.membrief || opts.segments {
                return Err(());
            }
            opts.header = true;
            opts.membrief = true;
            opts.segments = true;
        }
        if args.all_full {
            if opts.header || opts.memfull || opts.segments {
                return Err(());
            }
            opts.header = true;
            opts.memfull = true;
            opts.segments = true;
        }
        if opts.membrief && opts.memfull {
            return Err(());
        }

        Ok(opts)
    }
}

fn usage() {
    println!("Usage: y86 <option(s)> mini-elf-file");
    println!(" Options are:");
    println!("  -h      Display usage");
    println!("  -H      Show the Mini-ELF header");
    println!("  -a      Show all with brief memory");
    println!("  -f      Show all with full memory");
    println!("  -s      Show the program headers");
    println!("  -m      Show the memory contents (brief)");
    println!("  -M      Show the memory contents (full)");
    println!("  -d      Disassemble code contents");
    println!("  -D      Disassemble data contents");
    println!("  -e      Execute program");
    println!("  -E      Execute program (trace mode)");
    println!("Options must not be repeated neither explicitly nor implicitly.");
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(_) => {
            usage();
            return ExitCode::FAILURE;
        }
    };

    if args.help {
        usage();
        return ExitCode::SUCCESS;
    }

    let Ok(opts) = Options::resolve(&args) else {
        usage();
        return ExitCode::FAILURE;
    };

    let Some(file) = args.file.as_deref() else {
        usage();
        return ExitCode::FAILURE;
    };

    match run(&opts, file) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            println!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(opts: &Options, path: &Path) -> anyhow::Result<()> {
    let data = std::fs::read(path).context("Failed to open File")?;

    let header = ElfHeader::parse(&data).context("Failed to Read ELF Header")?;
    if opts.header {
        print!("{}", dump_header(&header));
    }

    let mut memory = Memory::new();
    let mut phdrs = Vec::with_capacity(usize::from(header.num_phdr));
    for i in 0..usize::from(header.num_phdr) {
        let offset = usize::from(header.phdr_start) + i * PHDR_SIZE;
        let phdr = ProgramHeader::parse(&data, offset)
            .context("Failed to Read Program Header")?;
        load_segment(&data, &phdr, &mut memory).context("Failed to Load Segment")?;
        phdrs.push(phdr);
    }

    if opts.segments {
        print!("{}", dump_phdrs(&phdrs));
    }

    if opts.membrief {
        for phdr in phdrs.iter().filter(|p| p.file_size != 0) {
            let start = (phdr.vaddr as usize) & !0xF;
            let end = phdr.vaddr as usize + phdr.file_size as usize;
            print!("{}", dump_memory(&memory, start, end));
            println!();
        }
    }

    if opts.memfull {
        print!("{}", dump_memory(&memory, 0, MEMSIZE));
    }

    if opts.disas_code {
        println!("Disassembly of executable contents:");
        for phdr in phdrs.iter().filter(|p| p.seg_type == SegmentType::Code) {
            print!("{}", disassemble_code(&memory, phdr, &header));
            println!();
        }
    }

    if opts.disas_data {
        println!("Disassembly of data contents:");
        for phdr in phdrs.iter().filter(|p| p.seg_type == SegmentType::Data) {
            // read-only data renders as strings, anything else as quads
            if phdr.flags == SegmentFlags::R {
                print!("{}", disassemble_rodata(&memory, phdr));
            } else {
                print!("{}", disassemble_data(&memory, phdr));
            }
            println!();
        }
    }

    if opts.exec_trace {
        let mut stdout = std::io::stdout().lock();
        execute(&header, &mut memory, true, &mut stdout)?;
    } else if opts.exec_normal {
        let mut stdout = std::io::stdout().lock();
        execute(&header, &mut memory, false, &mut stdout)?;
    }

    Ok(())
}
