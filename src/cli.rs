//! Minimal CLI parsing for the `murmur` binary.

use std::env;

use anyhow::{Context, Result, bail};

use murmur::config::parse_groups;

pub const USAGE: &str = "\
usage: murmur <kind> [options]

kinds: user, micro-post, blog-post, comment

lookup (one result):
  --id N            by primary key
  --slug S          by slug
  --uuid U          by uuid
  --short-uuid S    by base-62 short uuid

listing (default: all visible):
  --trashed         only trashed, newest first
  --unpublished     only unpublished, newest first
  --page N          page number (1-based)
  --per-page N      page size

output:
  --json            print JSON instead of a summary
  --groups a,b      projection groups for --json

  --init            create the table before querying";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Lookup {
    #[default]
    All,
    Trashed,
    Unpublished,
    Id(i64),
    Slug(String),
    Uuid(String),
    ShortUuid(String),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CliOptions {
    pub kind: Option<String>,
    pub lookup: Lookup,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub json: bool,
    pub groups: Vec<String>,
    pub init: bool,
    pub help: bool,
}

impl CliOptions {
    pub fn from_args() -> Result<Self> {
        Self::parse(env::args().skip(1))
    }

    pub fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = CliOptions::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => {
                    (flag.to_string(), Some(value.to_string()))
                }
                _ => (arg.clone(), None),
            };
            let mut value = || -> Result<String> {
                match inline.clone() {
                    Some(v) => Ok(v),
                    None => args
                        .next()
                        .with_context(|| format!("{} needs a value", flag)),
                }
            };

            match flag.as_str() {
                "-h" | "--help" => options.help = true,
                "--json" => options.json = true,
                "--init" => options.init = true,
                "--trashed" => options.set_lookup(Lookup::Trashed)?,
                "--unpublished" => options.set_lookup(Lookup::Unpublished)?,
                "--id" => {
                    let id = value()?.parse().context("Invalid --id")?;
                    options.set_lookup(Lookup::Id(id))?;
                }
                "--slug" => {
                    let slug = value()?;
                    options.set_lookup(Lookup::Slug(slug))?;
                }
                "--uuid" => {
                    let uuid = value()?;
                    options.set_lookup(Lookup::Uuid(uuid))?;
                }
                "--short-uuid" => {
                    let short = value()?;
                    options.set_lookup(Lookup::ShortUuid(short))?;
                }
                "--page" => options.page = Some(value()?.parse().context("Invalid --page")?),
                "--per-page" => {
                    options.per_page = Some(value()?.parse().context("Invalid --per-page")?)
                }
                "--groups" => options.groups.extend(parse_groups(&value()?)),
                _ if flag.starts_with('-') => bail!("unknown option {}", flag),
                _ if options.kind.is_none() => options.kind = Some(arg),
                _ => bail!("unexpected argument {}", arg),
            }
        }

        Ok(options)
    }

    fn set_lookup(&mut self, lookup: Lookup) -> Result<()> {
        if self.lookup != Lookup::All {
            bail!("only one of --id, --slug, --uuid, --short-uuid, --trashed, --unpublished");
        }
        self.lookup = lookup;
        Ok(())
    }
}
