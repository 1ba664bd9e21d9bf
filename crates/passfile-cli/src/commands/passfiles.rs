use passfile_core::{
    FileRepository, PassFile, PassFileId, PassFileType, PwdItem, PwdSection, Section, TxtSection,
};

use crate::app::App;
use crate::cli::{
    AddSectionArgs, ExportArgs, ListArgs, NewArgs, RemoveSectionArgs, RenameArgs, ShowArgs,
    StatusArgs,
};
use crate::helpers::{mask, prompt_new_passphrase};
use crate::output::{
    passfile_json, print_header, print_listing, print_pwd_sections, print_txt_sections,
    state_label,
};

pub fn handle_list(app: &App, args: &ListArgs) -> anyhow::Result<()> {
    let passfiles = if args.deleted {
        app.context.list_deleted()
    } else {
        app.context.list()
    };

    if args.json {
        let values: Vec<serde_json::Value> = passfiles.iter().map(passfile_json).collect();
        println!("{}", serde_json::to_string_pretty(&values)?);
    } else if passfiles.is_empty() {
        println!("No passfiles found.");
    } else {
        print_listing(&passfiles);
    }
    Ok(())
}

fn masked(sections: &[PwdSection]) -> Vec<PwdSection> {
    let mut sections = sections.to_vec();
    for item in sections.iter_mut().flat_map(|section| section.items.iter_mut()) {
        item.password = mask(&item.password);
    }
    sections
}

pub async fn handle_show(app: &App, args: &ShowArgs, quiet: bool) -> anyhow::Result<()> {
    let passfile = app.context.get(args.target.id)?;
    let cancel = &app.cancel;

    match passfile.passfile_type {
        PassFileType::Pwd => {
            let sections = app.context.content::<PwdSection>(passfile.id, cancel).await?;
            if args.json {
                let sections = if args.reveal { sections } else { masked(&sections) };
                print_json(&passfile, &sections)?;
            } else {
                if !quiet {
                    print_header(&passfile);
                }
                print_pwd_sections(&sections, args.reveal);
            }
        }
        PassFileType::Txt => {
            let sections = app.context.content::<TxtSection>(passfile.id, cancel).await?;
            if args.json {
                print_json(&passfile, &sections)?;
            } else {
                if !quiet {
                    print_header(&passfile);
                }
                print_txt_sections(&sections);
            }
        }
    }
    Ok(())
}

fn print_json<S: Section>(passfile: &PassFile, sections: &[S]) -> anyhow::Result<()> {
    let mut value = passfile_json(passfile);
    value["sections"] = serde_json::to_value(sections)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

pub async fn handle_export(app: &App, args: &ExportArgs, quiet: bool) -> anyhow::Result<()> {
    let passfile = app.context.get(args.target.id)?;
    let cancel = &app.cancel;
    let bytes = match passfile.passfile_type {
        PassFileType::Pwd => {
            app.context
                .export::<PwdSection>(passfile.id, args.pretty, cancel)
                .await?
        }
        PassFileType::Txt => {
            app.context
                .export::<TxtSection>(passfile.id, args.pretty, cancel)
                .await?
        }
    };

    if args.save {
        let exports = app.exports();
        let name = format!("{}.{}.json", passfile.id, passfile.passfile_type.extension());
        exports.write_all_bytes(&name, &bytes, cancel).await?;
        if !quiet {
            println!("Exported to {}", exports.dir().join(name).display());
        }
    } else {
        println!("{}", String::from_utf8_lossy(&bytes));
    }
    Ok(())
}

pub async fn handle_new(app: &App, args: &NewArgs, quiet: bool) -> anyhow::Result<()> {
    let passphrase = prompt_new_passphrase(args.name.trim()).await?;
    let cancel = &app.cancel;
    let id = match args.passfile_type {
        PassFileType::Pwd => {
            app.context
                .create::<PwdSection>(
                    &args.name,
                    args.color.clone(),
                    passphrase.into(),
                    Vec::new(),
                    cancel,
                )
                .await?
        }
        PassFileType::Txt => {
            app.context
                .create::<TxtSection>(
                    &args.name,
                    args.color.clone(),
                    passphrase.into(),
                    Vec::new(),
                    cancel,
                )
                .await?
        }
    };
    if !quiet {
        println!("Created passfile {}", id);
    } else {
        println!("{}", id);
    }
    Ok(())
}

pub async fn handle_rename(app: &App, args: &RenameArgs, quiet: bool) -> anyhow::Result<()> {
    app.context
        .update_info(args.target.id, &args.name, args.color.clone(), &app.cancel)
        .await?;
    if !quiet {
        println!("Updated passfile {}", args.target.id);
    }
    Ok(())
}

fn pwd_section(args: &AddSectionArgs) -> anyhow::Result<PwdSection> {
    if args.text.is_some() {
        return Err(anyhow::anyhow!("--text only applies to txt passfiles"));
    }
    let mut section = PwdSection::new(args.name.trim());
    if let Some(url) = &args.url {
        section = section.with_url(url.trim());
    }
    if !args.username.is_empty() || args.password.is_some() {
        section = section.with_item(PwdItem::new(
            args.username.clone(),
            args.password.clone().unwrap_or_default(),
        ));
    }
    Ok(section)
}

fn txt_section(args: &AddSectionArgs) -> anyhow::Result<TxtSection> {
    if args.url.is_some() || !args.username.is_empty() || args.password.is_some() {
        return Err(anyhow::anyhow!(
            "--url, --username and --password only apply to pwd passfiles"
        ));
    }
    Ok(TxtSection::new(
        args.name.trim(),
        args.text.clone().unwrap_or_default(),
    ))
}

pub async fn handle_add_section(
    app: &App,
    args: &AddSectionArgs,
    quiet: bool,
) -> anyhow::Result<()> {
    if args.name.trim().is_empty() {
        return Err(anyhow::anyhow!("Section name cannot be empty"));
    }
    let id = args.target.id;
    let cancel = &app.cancel;
    match app.context.get(id)?.passfile_type {
        PassFileType::Pwd => {
            let section = pwd_section(args)?;
            app.context
                .update_content::<PwdSection, _>(id, move |sections| sections.push(section), cancel)
                .await?;
        }
        PassFileType::Txt => {
            let section = txt_section(args)?;
            app.context
                .update_content::<TxtSection, _>(id, move |sections| sections.push(section), cancel)
                .await?;
        }
    }
    if !quiet {
        println!("Added section '{}' to passfile {}", args.name.trim(), id);
    }
    Ok(())
}

async fn remove_named<S: Section>(app: &App, id: PassFileId, name: &str) -> anyhow::Result<()> {
    let current = app.context.content::<S>(id, &app.cancel).await?;
    if !current.iter().any(|section| section.name() == name) {
        return Err(anyhow::anyhow!(
            "Passfile {} has no section named '{}'",
            id,
            name
        ));
    }
    let name = name.to_string();
    app.context
        .update_content::<S, _>(
            id,
            move |sections| sections.retain(|section| section.name() != name),
            &app.cancel,
        )
        .await?;
    Ok(())
}

pub async fn handle_remove_section(
    app: &App,
    args: &RemoveSectionArgs,
    quiet: bool,
) -> anyhow::Result<()> {
    let id = args.target.id;
    let name = args.name.trim();
    match app.context.get(id)?.passfile_type {
        PassFileType::Pwd => remove_named::<PwdSection>(app, id, name).await?,
        PassFileType::Txt => remove_named::<TxtSection>(app, id, name).await?,
    }
    if !quiet {
        println!("Removed section '{}' from passfile {}", name, id);
    }
    Ok(())
}

pub async fn handle_passwd(app: &App, id: PassFileId, quiet: bool) -> anyhow::Result<()> {
    let passfile = app.context.get(id)?;
    let passphrase = prompt_new_passphrase(&passfile.name).await?;
    app.context
        .change_passphrase(id, passphrase.into(), &app.cancel)
        .await?;
    if !quiet {
        println!("Changed passphrase of passfile {}", id);
    }
    Ok(())
}

pub async fn handle_delete(app: &App, id: PassFileId, quiet: bool) -> anyhow::Result<()> {
    let passfile = app.context.get(id)?;
    app.context.delete(id, &app.cancel).await?;
    if !quiet {
        if passfile.is_local_only() {
            println!("Removed passfile {}", id);
        } else {
            println!(
                "Deleted passfile {} locally; the server copy stays until deletion is confirmed",
                id
            );
        }
    }
    Ok(())
}

pub async fn handle_restore(app: &App, id: PassFileId, quiet: bool) -> anyhow::Result<()> {
    app.context.restore(id, &app.cancel).await?;
    if !quiet {
        println!("Restored passfile {}", id);
    }
    Ok(())
}

pub fn handle_status(app: &App, args: &StatusArgs) -> anyhow::Result<()> {
    let passfiles = match args.id {
        Some(id) => vec![app.context.get(id)?],
        None => {
            let mut passfiles = app.context.list();
            passfiles.extend(app.context.list_deleted());
            passfiles
        }
    };
    for passfile in passfiles {
        let origin = passfile
            .origin
            .as_ref()
            .map(|origin| format!("v{}", origin.version))
            .unwrap_or_else(|| "never uploaded".to_string());
        let deleted = if passfile.is_deleted() { ", deleted" } else { "" };
        println!(
            "{}: {} (local v{}, server {}{})",
            passfile.id,
            state_label(passfile.state()),
            passfile.version,
            origin,
            deleted
        );
    }
    Ok(())
}
